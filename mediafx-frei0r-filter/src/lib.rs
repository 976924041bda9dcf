//! frei0r filter plugin: `mediafx_filter.so`.

mediafx_frei0r::export_plugin!(mediafx_frei0r::Filter);

//! frei0r source plugin: `mediafx_source.so`.

mediafx_frei0r::export_plugin!(mediafx_frei0r::Source);

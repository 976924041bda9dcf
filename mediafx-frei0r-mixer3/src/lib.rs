//! frei0r mixer3 plugin: `mediafx_mixer3.so`.

mediafx_frei0r::export_plugin!(mediafx_frei0r::Mixer3);

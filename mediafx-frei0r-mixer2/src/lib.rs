//! frei0r mixer2 plugin: `mediafx_mixer2.so`.

mediafx_frei0r::export_plugin!(mediafx_frei0r::Mixer2);

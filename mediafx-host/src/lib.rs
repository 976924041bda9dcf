//! # mediafx-host: frame server driver
//!
//! Spawns a render client through [`mediafx_core::MediaFxServer`] and
//! requests frames from it at a fixed rate. Useful for exercising a
//! client outside a video editor: source frames carry a deterministic
//! test pattern, and rendered frames can be digested with blake3 or
//! dumped as raw RGBA.

pub mod config;
pub mod service;

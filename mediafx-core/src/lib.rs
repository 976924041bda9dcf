//! # mediafx-core
//!
//! Frame server library: a host process spawns a render client, shares a
//! block of RGBA frames with it and asks it to render one frame per
//! timestamp.
//!
//! This crate contains:
//! - **Context**: `RenderSize` and `RenderContext`, the frame geometry and
//!   the shared segment laid out as source frames followed by the rendered frame
//! - **Messages**: handshake, render request and acknowledgement types, and
//!   the bincode framing used on the pipes
//! - **Server**: `MediaFxServer`, the host side that spawns and drives a client
//! - **Client**: `MediaFxClient` / `RenderFrame`, the render side typestate
//! - **State**: `ClientState`, a single-owner wrapper for scripting bindings
//! - **Plugin**: `FrameServerPlugin`, the video-host adapter
//! - **Effects**: pixel routines used by the bundled clients
//! - **Error**: `MediaFxError`, a `thiserror`-based error type

use std::os::fd::RawFd;

pub mod client;
pub mod context;
pub mod effects;
pub mod error;
pub mod message;
pub mod plugin;
pub mod server;
pub mod state;

/// Fd on which a client reads host requests.
pub const CLIENT_IN_FD: RawFd = 3;
/// Fd on which a client writes acknowledgements.
pub const CLIENT_OUT_FD: RawFd = 4;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::{MediaFxClient, RenderFrame};
pub use context::{BYTES_PER_PIXEL, RenderContext, RenderSize};
pub use error::MediaFxError;
pub use message::{RenderAck, RenderData, RenderInitialize};
pub use plugin::{
    Filter, FrameServerPlugin, Mixer2, Mixer3, PluginInfo, PluginKind, PluginParams, Source,
};
pub use server::{MediaFxServer, ServerOptions};
pub use state::ClientState;

//! Domain-specific error types for the MediaFX frame server.
//!
//! All fallible operations return `Result<T, MediaFxError>`.

use thiserror::Error;

/// The canonical error type for MediaFX.
#[derive(Debug, Error)]
pub enum MediaFxError {
    // ── Geometry Errors ──────────────────────────────────────────
    /// The requested frame geometry is empty or overflows.
    #[error("invalid render size: {0}")]
    InvalidSize(String),

    /// A frame index past the last source frame was requested.
    #[error("frame number out of range: {index} (source frames: {count})")]
    FrameOutOfRange { index: usize, count: usize },

    /// A caller supplied a different number of frames than the plugin kind takes.
    #[error("expected {expected} frames, got {actual}")]
    FrameCountMismatch { expected: usize, actual: usize },

    /// A caller buffer does not match the frame byte count.
    #[error("frame lengths do not match, {expected} != {actual}")]
    FrameLength { expected: usize, actual: usize },

    // ── Transport Errors ─────────────────────────────────────────
    /// The pipe or process layer reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding of a message failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Creating or attaching the shared frame segment failed.
    #[error("shared memory error: {0}")]
    SharedMemory(#[from] shared_memory::ShmemError),

    // ── Protocol Errors ──────────────────────────────────────────
    /// The peer acknowledged a request with an error.
    #[error("client rejected request: {0}")]
    ClientRejected(String),

    /// The host asked the client to shut down.
    #[error("terminated by host")]
    Terminated,

    /// The operation is not valid in the current render state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl MediaFxError {
    /// Returns `true` if the host requested termination.
    pub fn is_terminated(&self) -> bool {
        matches!(self, MediaFxError::Terminated)
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for MediaFxError {
    fn from(s: String) -> Self {
        MediaFxError::Other(s)
    }
}

impl From<&str> for MediaFxError {
    fn from(s: &str) -> Self {
        MediaFxError::Other(s.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for MediaFxError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        match *e {
            bincode::ErrorKind::Io(io) => MediaFxError::Io(io),
            other => MediaFxError::Encoding(other.to_string()),
        }
    }
}

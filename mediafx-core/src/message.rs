//! Messages exchanged between host and client over the pipe pair.
//!
//! ```text
//! host                                   client
//!  │ ── RenderInitialize ─────────────────► │   once, after spawn
//!  │ ◄────────────────────────── RenderAck ─ │
//!  │ ── RenderFrame::Render(RenderData) ──► │   per frame
//!  │ ◄────────────────────────── RenderAck ─ │
//!  │ ── RenderFrame::Terminate ───────────► │   on shutdown
//! ```
//!
//! Every message is bincode-encoded and flushed on its own. Messages
//! larger than [`MAX_MESSAGE`] are refused on both ends.

use std::io::{Read, Write};

use bincode::Options;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::context::RenderSize;
use crate::error::MediaFxError;

// ── RenderData ───────────────────────────────────────────────────

/// Per-frame values sent with every render request.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderData {
    /// Frame time in seconds.
    pub time: f64,
    pub param1: f64,
    pub param2: f64,
    pub param3: f64,
}

impl RenderData {
    pub fn new(time: f64, param1: f64, param2: f64, param3: f64) -> Self {
        RenderData {
            time,
            param1,
            param2,
            param3,
        }
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.time, self.param1, self.param2, self.param3)
    }
}

impl From<(f64, f64, f64, f64)> for RenderData {
    fn from((time, param1, param2, param3): (f64, f64, f64, f64)) -> Self {
        RenderData::new(time, param1, param2, param3)
    }
}

impl From<RenderData> for (f64, f64, f64, f64) {
    fn from(data: RenderData) -> Self {
        data.as_tuple()
    }
}

impl From<RenderData> for [f64; 4] {
    fn from(data: RenderData) -> Self {
        [data.time, data.param1, data.param2, data.param3]
    }
}

// ── Messages ─────────────────────────────────────────────────────

/// Handshake sent by the host right after spawning the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderInitialize {
    size: RenderSize,
    shmem_id: String,
    config: String,
}

impl RenderInitialize {
    pub fn new(size: RenderSize, shmem_id: String, config: String) -> Self {
        RenderInitialize {
            size,
            shmem_id,
            config,
        }
    }

    pub fn size(&self) -> &RenderSize {
        &self.size
    }

    pub fn shmem_id(&self) -> &str {
        &self.shmem_id
    }

    pub fn config(&self) -> &str {
        &self.config
    }
}

/// Client reply to the handshake and to every render request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderAck {
    error: Option<String>,
}

impl RenderAck {
    pub fn error(message: impl Into<String>) -> Self {
        RenderAck {
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Turn an error acknowledgement into [`MediaFxError::ClientRejected`].
    pub fn into_result(self) -> Result<(), MediaFxError> {
        match self.error {
            None => Ok(()),
            Some(message) => Err(MediaFxError::ClientRejected(message)),
        }
    }
}

/// Per-frame request from the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RenderFrame {
    Render(RenderData),
    Terminate,
}

// ── Framing ──────────────────────────────────────────────────────

/// Largest encoded message either side accepts, in bytes.
pub const MAX_MESSAGE: u64 = 16 * 1024 * 1024;

/// Fixed-width integers with a size limit, shared by both directions.
fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_MESSAGE)
}

/// Encode `message` onto `writer` and flush.
pub fn send<M: Serialize, W: Write>(message: &M, writer: &mut W) -> Result<(), MediaFxError> {
    wire_options().serialize_into(&mut *writer, message)?;
    writer.flush()?;
    Ok(())
}

/// Decode the next message from `reader`.
///
/// A length prefix past [`MAX_MESSAGE`] fails with
/// [`MediaFxError::Encoding`] before anything is allocated.
pub fn receive<M: DeserializeOwned, R: Read>(reader: &mut R) -> Result<M, MediaFxError> {
    Ok(wire_options().deserialize_from(reader)?)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn messages_share_one_stream() {
        let size = RenderSize::new(640, 480, 2).unwrap();
        let mut wire = Vec::new();
        send(
            &RenderInitialize::new(size, "/shmem_id".into(), "mode = \"cycle\"".into()),
            &mut wire,
        )
        .unwrap();
        send(
            &RenderFrame::Render(RenderData::new(1.5, 0.25, 0.5, 0.75)),
            &mut wire,
        )
        .unwrap();
        send(&RenderFrame::Terminate, &mut wire).unwrap();

        let mut reader = Cursor::new(wire);
        let init: RenderInitialize = receive(&mut reader).unwrap();
        assert_eq!(*init.size(), size);
        assert_eq!(init.shmem_id(), "/shmem_id");
        assert_eq!(init.config(), "mode = \"cycle\"");

        let frame: RenderFrame = receive(&mut reader).unwrap();
        assert_eq!(
            frame,
            RenderFrame::Render(RenderData::new(1.5, 0.25, 0.5, 0.75))
        );
        let frame: RenderFrame = receive(&mut reader).unwrap();
        assert_eq!(frame, RenderFrame::Terminate);
    }

    #[test]
    fn closed_stream_is_eof() {
        let mut reader = Cursor::new(Vec::new());
        let result: Result<RenderFrame, _> = receive(&mut reader);
        match result {
            Err(MediaFxError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected eof, got {other:?}"),
        }
    }

    #[test]
    fn forged_length_is_refused() {
        // `Some(String)` claiming a terabyte of message text.
        let mut wire = vec![1u8];
        wire.extend_from_slice(&(1u64 << 40).to_le_bytes());
        let result: Result<RenderAck, _> = receive(&mut Cursor::new(wire));
        assert!(matches!(result, Err(MediaFxError::Encoding(_))));
    }

    #[test]
    fn oversized_message_is_not_sent() {
        let huge = "x".repeat(MAX_MESSAGE as usize);
        let mut wire = Vec::new();
        let result = send(&RenderAck::error(huge), &mut wire);
        assert!(matches!(result, Err(MediaFxError::Encoding(_))));
    }

    #[test]
    fn error_ack_becomes_rejection() {
        assert!(RenderAck::default().into_result().is_ok());
        let err = RenderAck::error("bad frame").into_result().unwrap_err();
        assert!(matches!(err, MediaFxError::ClientRejected(ref m) if m == "bad frame"));
    }

    #[test]
    fn render_data_tuple_conversions() {
        let data: RenderData = (1.0, 2.0, 3.0, 4.0).into();
        assert_eq!(data.param2, 3.0);
        let array: [f64; 4] = data.into();
        assert_eq!(array, [1.0, 2.0, 3.0, 4.0]);
    }
}

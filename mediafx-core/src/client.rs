//! Render side of the frame server.
//!
//! A render client is a program spawned by [`MediaFxServer`](crate::server::MediaFxServer).
//! It is a typestate pair:
//!
//! - [`MediaFxClient`] waits for the next request.
//! - [`RenderFrame`] holds a request in flight and gives access to the
//!   source frames and the rendered frame until it is committed.
//!
//! ```no_run
//! # use mediafx_core::client::MediaFxClient;
//! # fn main() -> Result<(), mediafx_core::MediaFxError> {
//! let mut client = MediaFxClient::new()?;
//! loop {
//!     let mut frame = match client.render_frame() {
//!         Ok(frame) => frame,
//!         Err((_, e)) if e.is_terminated() => return Ok(()),
//!         Err((_, e)) => return Err(e),
//!     };
//!     frame.rendered_frame_mut().fill(0xFF);
//!     client = frame.commit().map_err(|(_, e)| e)?;
//! }
//! # }
//! ```

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};

use shared_memory::ShmemConf;
use tracing::{debug, warn};

use crate::context::{RenderContext, RenderSize};
use crate::error::MediaFxError;
use crate::message::{self, RenderAck, RenderData, RenderInitialize};
use crate::{CLIENT_IN_FD, CLIENT_OUT_FD};

/// Set once fds 3/4 have been adopted; they can only be owned once.
static PIPES_TAKEN: AtomicBool = AtomicBool::new(false);

// ── MediaFxClient ────────────────────────────────────────────────

/// An attached render client between requests.
pub struct MediaFxClient {
    input: Box<dyn Read + Send>,
    output: Box<dyn Write + Send>,
    context: RenderContext,
    config: String,
}

impl std::fmt::Debug for MediaFxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFxClient")
            .field("context", &self.context)
            .field("config", &self.config)
            .finish()
    }
}

impl MediaFxClient {
    /// Attach to the host that spawned this process.
    ///
    /// Adopts fds 3 and 4, reads the handshake, maps the frame segment
    /// and acknowledges. Fails if the process was not launched by a
    /// MediaFX host or if called twice.
    pub fn new() -> Result<Self, MediaFxError> {
        Self::new_with(|_| Ok(())).map(|(client, ())| client)
    }

    /// Attach like [`new`](Self::new), parsing the host's config string
    /// before acknowledging.
    ///
    /// A config that `parse_config` refuses is reported to the host as
    /// a rejected handshake.
    pub fn new_with<T, F>(parse_config: F) -> Result<(Self, T), MediaFxError>
    where
        F: FnOnce(&str) -> Result<T, MediaFxError>,
    {
        if PIPES_TAKEN.swap(true, Ordering::SeqCst) {
            return Err(MediaFxError::InvalidState("client pipes already taken"));
        }
        let input = adopt_fd(CLIENT_IN_FD)?;
        let output = adopt_fd(CLIENT_OUT_FD)?;
        Self::from_pipes_with(input, output, parse_config)
    }

    /// Attach over arbitrary streams.
    pub fn from_pipes<R, W>(input: R, output: W) -> Result<Self, MediaFxError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::from_pipes_with(input, output, |_| Ok(())).map(|(client, ())| client)
    }

    /// Attach over arbitrary streams, parsing the config before acknowledging.
    pub fn from_pipes_with<R, W, T, F>(
        mut input: R,
        mut output: W,
        parse_config: F,
    ) -> Result<(Self, T), MediaFxError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        F: FnOnce(&str) -> Result<T, MediaFxError>,
    {
        let initialize: RenderInitialize = message::receive(&mut input)?;
        let attached = Self::attach(&initialize)
            .and_then(|context| Ok((context, parse_config(initialize.config())?)));
        let (context, parsed) = match attached {
            Ok(attached) => attached,
            Err(e) => {
                // Tell the host why, so it fails instead of waiting.
                let _ = message::send(&RenderAck::error(e.to_string()), &mut output);
                return Err(e);
            }
        };
        message::send(&RenderAck::default(), &mut output)?;
        debug!(size = ?context.render_size(), "attached to host");

        let client = MediaFxClient {
            input: Box::new(input),
            output: Box::new(output),
            context,
            config: initialize.config().into(),
        };
        Ok((client, parsed))
    }

    fn attach(initialize: &RenderInitialize) -> Result<RenderContext, MediaFxError> {
        let shmem = ShmemConf::new().os_id(initialize.shmem_id()).open()?;
        RenderContext::new(*initialize.size(), shmem)
    }

    /// Opaque configuration string chosen by the host.
    pub fn config(&self) -> &str {
        &self.config
    }

    pub fn render_size(&self) -> RenderSize {
        self.context.render_size()
    }

    /// Block until the host sends the next request.
    ///
    /// On `Terminate` the client is handed back with
    /// [`MediaFxError::Terminated`]; on any other failure it is handed
    /// back with the error.
    #[allow(clippy::result_large_err)]
    pub fn render_frame(mut self) -> Result<RenderFrame, (Self, MediaFxError)> {
        match message::receive(&mut self.input) {
            Ok(message::RenderFrame::Render(render_data)) => Ok(RenderFrame {
                client: self,
                render_data,
            }),
            Ok(message::RenderFrame::Terminate) => {
                debug!("host requested termination");
                Err((self, MediaFxError::Terminated))
            }
            Err(e) => Err((self, e)),
        }
    }
}

// ── RenderFrame ──────────────────────────────────────────────────

/// A render request in flight.
#[derive(Debug)]
pub struct RenderFrame {
    client: MediaFxClient,
    render_data: RenderData,
}

impl RenderFrame {
    pub fn render_data(&self) -> &RenderData {
        &self.render_data
    }

    pub fn config(&self) -> &str {
        &self.client.config
    }

    pub fn render_size(&self) -> RenderSize {
        self.client.context.render_size()
    }

    pub fn source_frame(&self, index: usize) -> Result<&[u8], MediaFxError> {
        self.client.context.frame(index)
    }

    pub fn source_frames<const N: usize>(&self) -> Result<[&[u8]; N], MediaFxError> {
        self.client.context.frames()
    }

    pub fn rendered_frame_mut(&mut self) -> &mut [u8] {
        self.client.context.rendered_frame_mut()
    }

    #[allow(clippy::type_complexity)]
    pub fn frames_with_rendered_frame_mut<const N: usize>(
        &mut self,
    ) -> Result<([&[u8]; N], &mut [u8]), MediaFxError> {
        self.client.context.frames_with_rendered_frame_mut()
    }

    /// Tell the host the rendered frame is ready.
    #[allow(clippy::result_large_err)]
    pub fn commit(self) -> Result<MediaFxClient, (Self, MediaFxError)> {
        self.acknowledge(RenderAck::default())
    }

    /// Fail this request; the host's `render` returns
    /// [`MediaFxError::ClientRejected`] with `message`.
    #[allow(clippy::result_large_err)]
    pub fn abort(self, message: impl Into<String>) -> Result<MediaFxClient, (Self, MediaFxError)> {
        let message = message.into();
        warn!(time = self.render_data.time, "aborting frame: {message}");
        self.acknowledge(RenderAck::error(message))
    }

    #[allow(clippy::result_large_err)]
    fn acknowledge(mut self, ack: RenderAck) -> Result<MediaFxClient, (Self, MediaFxError)> {
        match message::send(&ack, &mut self.client.output) {
            Ok(()) => Ok(self.client),
            Err(e) => Err((self, e)),
        }
    }
}

/// Take ownership of an inherited fd and keep it from leaking into
/// programs this client may spawn.
fn adopt_fd(fd: RawFd) -> Result<File, MediaFxError> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(MediaFxError::InvalidState(
            "frame pipes missing; was this process started by a MediaFX host?",
        ));
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
        return Err(std::io::Error::last_os_error().into());
    }
    // Safety: the fd is open and `PIPES_TAKEN` guarantees a single owner.
    Ok(File::from(unsafe { OwnedFd::from_raw_fd(fd) }))
}

// ── Tests ────────────────────────────────────────────────────────

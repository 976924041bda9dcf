//! Host side of the frame server.
//!
//! [`MediaFxServer`] spawns a render client, shares a frame segment with
//! it and drives it one frame at a time:
//!
//! 1. Write source frames with [`source_frame_mut`](MediaFxServer::source_frame_mut)
//!    or [`source_frames_mut`](MediaFxServer::source_frames_mut).
//! 2. Call [`render`](MediaFxServer::render), which blocks until the client
//!    commits, and read the rendered frame it returns.
//!
//! The client reads requests from fd [`CLIENT_IN_FD`] and writes
//! acknowledgements to fd [`CLIENT_OUT_FD`]; its stdin is null and its
//! stdout/stderr are inherited.
//!
//! Writes to the client never raise `SIGPIPE`, even in hosts that keep
//! its default disposition: a client that has exited shows up as
//! [`MediaFxError::Io`] with `BrokenPipe`.

use std::ffi::OsStr;
use std::io::{self, PipeReader, PipeWriter};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde::Serialize;
use shared_memory::ShmemConf;
use tracing::{debug, info, trace, warn};

use crate::context::{RenderContext, RenderSize};
use crate::error::MediaFxError;
use crate::message::{self, RenderAck, RenderData, RenderFrame, RenderInitialize};
use crate::{CLIENT_IN_FD, CLIENT_OUT_FD};

/// Lowest fd used to park pipe ends in the child before installing them.
const FD_SCRATCH: RawFd = 10;

/// Poll interval while waiting for a terminated client to exit.
const EXIT_POLL: Duration = Duration::from_millis(10);

// ── ServerOptions ────────────────────────────────────────────────

/// Spawn options beyond the frame geometry.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Extra arguments passed to the client program.
    pub args: Vec<String>,
    /// How long to wait for the client to exit after `Terminate`
    /// before killing it.
    pub terminate_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            terminate_timeout: Duration::from_secs(5),
        }
    }
}

// ── MediaFxServer ────────────────────────────────────────────────

/// A running render client and the frame segment shared with it.
///
/// Dropping the server terminates the client.
pub struct MediaFxServer {
    context: RenderContext,
    client: Child,
    /// `None` once `Terminate` has been sent and the pipe closed.
    client_input: Option<PipeWriter>,
    client_output: PipeReader,
    terminate_timeout: Duration,
}

impl std::fmt::Debug for MediaFxServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFxServer")
            .field("context", &self.context)
            .field("client_pid", &self.client.id())
            .finish()
    }
}

impl MediaFxServer {
    /// Spawn `client_path` and complete the handshake with default options.
    pub fn new<P, C>(
        client_path: P,
        config: C,
        width: u32,
        height: u32,
        count: usize,
    ) -> Result<Self, MediaFxError>
    where
        P: AsRef<OsStr>,
        C: Into<String>,
    {
        Self::with_options(
            client_path,
            config,
            width,
            height,
            count,
            ServerOptions::default(),
        )
    }

    /// Spawn `client_path` with explicit [`ServerOptions`].
    pub fn with_options<P, C>(
        client_path: P,
        config: C,
        width: u32,
        height: u32,
        count: usize,
        options: ServerOptions,
    ) -> Result<Self, MediaFxError>
    where
        P: AsRef<OsStr>,
        C: Into<String>,
    {
        let size = RenderSize::new(width, height, count)?;
        let shmem = ShmemConf::new().size(size.memory_size()).create()?;
        let context = RenderContext::new(size, shmem)?;

        let (childin_rx, childin_tx) = io::pipe()?;
        let (childout_rx, childout_tx) = io::pipe()?;
        let (in_fd, out_fd) = (childin_rx.as_raw_fd(), childout_tx.as_raw_fd());

        let mut command = Command::new(client_path.as_ref());
        command.args(&options.args).stdin(Stdio::null());
        // Safety: only async-signal-safe libc calls run between fork and exec.
        unsafe {
            command.pre_exec(move || install_client_fds(in_fd, out_fd));
        }
        let client = command.spawn()?;
        // The child holds its own copies; closing ours lets EOF propagate.
        drop(childin_rx);
        drop(childout_tx);
        info!(
            pid = client.id(),
            client = %client_path.as_ref().to_string_lossy(),
            width,
            height,
            count,
            "spawned render client"
        );

        // From here on a failed handshake drops `server`, which reaps the client.
        let mut server = MediaFxServer {
            context,
            client,
            client_input: Some(childin_tx),
            client_output: childout_rx,
            terminate_timeout: options.terminate_timeout,
        };
        server.handshake(config.into())?;
        Ok(server)
    }

    fn handshake(&mut self, config: String) -> Result<(), MediaFxError> {
        let size = self.context.render_size();
        let initialize = RenderInitialize::new(size, self.context.os_id().into(), config);
        let input = self
            .client_input
            .as_mut()
            .ok_or(MediaFxError::InvalidState("client input already closed"))?;
        send_to_client(&initialize, input)?;
        let ack: RenderAck = message::receive(&mut self.client_output)?;
        if let Err(e) = ack.into_result() {
            warn!(pid = self.client.id(), "client rejected handshake: {e}");
            return Err(e);
        }
        debug!(pid = self.client.id(), shmem = self.context.os_id(), "handshake complete");
        Ok(())
    }

    pub fn size(&self) -> RenderSize {
        self.context.render_size()
    }

    /// Process id of the render client.
    pub fn client_pid(&self) -> u32 {
        self.client.id()
    }

    pub fn source_frame_mut(&mut self, index: usize) -> Result<&mut [u8], MediaFxError> {
        self.context.frame_mut(index)
    }

    pub fn source_frames_mut<const N: usize>(&mut self) -> Result<[&mut [u8]; N], MediaFxError> {
        self.context.frames_mut()
    }

    /// Ask the client to render and wait for its commit.
    ///
    /// Returns the rendered frame. A client that acknowledges with an
    /// error yields [`MediaFxError::ClientRejected`].
    pub fn render(&mut self, data: RenderData) -> Result<&mut [u8], MediaFxError> {
        let input = self
            .client_input
            .as_mut()
            .ok_or(MediaFxError::InvalidState("client input already closed"))?;
        send_to_client(&RenderFrame::Render(data), input)?;
        let ack: RenderAck = message::receive(&mut self.client_output)?;
        if let Err(e) = ack.into_result() {
            warn!(pid = self.client.id(), time = data.time, "render failed: {e}");
            return Err(e);
        }
        trace!(pid = self.client.id(), time = data.time, "frame rendered");
        Ok(self.context.rendered_frame_mut())
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Wait for the client to exit, killing it after the timeout.
    fn reap(&mut self, deadline: Instant) {
        loop {
            match self.client.try_wait() {
                Ok(Some(status)) => {
                    debug!(pid = self.client.id(), %status, "render client exited");
                    return;
                }
                Ok(None) if Instant::now() < deadline => std::thread::sleep(EXIT_POLL),
                Ok(None) => {
                    warn!(pid = self.client.id(), "render client did not exit; killing");
                    self.kill();
                    return;
                }
                Err(e) => {
                    warn!(pid = self.client.id(), "wait failed: {e}");
                    self.kill();
                    return;
                }
            }
        }
    }

    fn kill(&mut self) {
        let _ = self.client.kill();
        let _ = self.client.wait();
    }
}

impl Drop for MediaFxServer {
    fn drop(&mut self) {
        // Sending and then dropping the writer closes the client's input.
        let terminated = match self.client_input.take() {
            Some(mut input) => send_to_client(&RenderFrame::Terminate, &mut input).is_ok(),
            None => false,
        };
        if terminated {
            self.reap(Instant::now() + self.terminate_timeout);
        } else {
            self.kill();
        }
    }
}

// ── SIGPIPE ──────────────────────────────────────────────────────

/// Send `message` to the client with `SIGPIPE` blocked on this thread.
fn send_to_client<M: Serialize>(request: &M, input: &mut PipeWriter) -> Result<(), MediaFxError> {
    let _guard = SigpipeGuard::block()?;
    message::send(request, input)
}

/// Blocks `SIGPIPE` for the calling thread until dropped.
///
/// A pipe write raises `SIGPIPE` on the writing thread, so it stays
/// pending while blocked. On drop, a `SIGPIPE` that was not already
/// pending on entry is consumed before the old mask is restored.
struct SigpipeGuard {
    set: libc::sigset_t,
    was_pending: bool,
    was_blocked: bool,
}

impl SigpipeGuard {
    fn block() -> io::Result<Self> {
        // Safety: the sigset_t values are initialised by sigemptyset
        // before use and only passed to libc by pointer.
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGPIPE);
            let was_pending = sigpipe_pending()?;

            let mut old: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut old);
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut old);
            if rc != 0 {
                return Err(io::Error::from_raw_os_error(rc));
            }
            Ok(SigpipeGuard {
                set,
                was_pending,
                was_blocked: libc::sigismember(&old, libc::SIGPIPE) == 1,
            })
        }
    }
}

impl Drop for SigpipeGuard {
    fn drop(&mut self) {
        if !self.was_pending && sigpipe_pending().unwrap_or(false) {
            let mut signal: libc::c_int = 0;
            // Safety: SIGPIPE is pending and blocked, so sigwait returns at once.
            unsafe { libc::sigwait(&self.set, &mut signal) };
            trace!("consumed SIGPIPE from client write");
        }
        if !self.was_blocked {
            // Safety: restores the mask for this thread only.
            unsafe { libc::pthread_sigmask(libc::SIG_UNBLOCK, &self.set, std::ptr::null_mut()) };
        }
    }
}

fn sigpipe_pending() -> io::Result<bool> {
    // Safety: `pending` is filled by sigpending before it is read.
    unsafe {
        let mut pending: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut pending);
        cvt(libc::sigpending(&mut pending))?;
        Ok(libc::sigismember(&pending, libc::SIGPIPE) == 1)
    }
}

// ── Child setup ──────────────────────────────────────────────────

/// Runs in the forked child: install the pipe ends as fds 3 and 4.
///
/// Both ends are first parked above [`FD_SCRATCH`] (close-on-exec) so
/// installing one cannot clobber the other. `dup2` clears
/// close-on-exec on the installed copies.
fn install_client_fds(in_fd: RawFd, out_fd: RawFd) -> io::Result<()> {
    let parked_in = cvt(unsafe { libc::fcntl(in_fd, libc::F_DUPFD_CLOEXEC, FD_SCRATCH) })?;
    let parked_out = cvt(unsafe { libc::fcntl(out_fd, libc::F_DUPFD_CLOEXEC, FD_SCRATCH) })?;
    cvt(unsafe { libc::dup2(parked_in, CLIENT_IN_FD) })?;
    cvt(unsafe { libc::dup2(parked_out, CLIENT_OUT_FD) })?;
    Ok(())
}

fn cvt(result: libc::c_int) -> io::Result<libc::c_int> {
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(result)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = ServerOptions::default();
        assert!(options.args.is_empty());
        assert_eq!(options.terminate_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_size_fails_before_spawn() {
        let result = MediaFxServer::new("/nonexistent/client", "", 0, 10, 1);
        assert!(matches!(result, Err(MediaFxError::InvalidSize(_))));
    }

    #[test]
    fn missing_client_is_io_error() {
        let result = MediaFxServer::new("/nonexistent/mediafx-client", "", 4, 4, 1);
        assert!(matches!(result, Err(MediaFxError::Io(_))));
    }

    #[test]
    fn sigpipe_guard_restores_mask() {
        fn blocked() -> bool {
            unsafe {
                let mut current: libc::sigset_t = std::mem::zeroed();
                libc::sigemptyset(&mut current);
                libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), &mut current);
                libc::sigismember(&current, libc::SIGPIPE) == 1
            }
        }

        assert!(!blocked());
        let guard = SigpipeGuard::block().unwrap();
        assert!(blocked());
        drop(guard);
        assert!(!blocked());
    }

    #[test]
    fn write_to_closed_pipe_is_broken_pipe() {
        let (reader, mut writer) = io::pipe().unwrap();
        drop(reader);
        let err = send_to_client(&RenderFrame::Terminate, &mut writer).unwrap_err();
        assert!(matches!(err, MediaFxError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert!(!sigpipe_pending().unwrap());
    }

    #[test]
    fn client_that_exits_fails_handshake() {
        // `true` never reads the handshake and exits, closing fd 4.
        let result = MediaFxServer::new("true", "", 4, 4, 0);
        assert!(result.is_err());
    }
}

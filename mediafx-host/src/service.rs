//! Host driver core logic.
//!
//! Spawns the configured render client, fills its source frames with a
//! test pattern and requests one rendered frame per tick until the frame
//! limit is reached or the service is stopped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use mediafx_core::{BYTES_PER_PIXEL, MediaFxServer, RenderData};

use crate::config::HostConfig;

/// Outcome of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames rendered and committed by the client.
    pub frames: u64,
    /// blake3 digest of the last rendered frame, when digests are enabled.
    pub last_digest: Option<String>,
}

// ── HostService ──────────────────────────────────────────────────

/// Drives one render client at a fixed frame rate.
pub struct HostService {
    config: HostConfig,
    /// Cleared to request a stop; never set again once cleared.
    keep_running: Arc<AtomicBool>,
    running: AtomicBool,
}

impl HostService {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            keep_running: Arc::new(AtomicBool::new(true)),
            running: AtomicBool::new(false),
        }
    }

    /// Obtain a handle that stops the service when set to `false`.
    ///
    /// A stop requested before [`run`](Self::run) starts makes the run
    /// return at once.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.keep_running)
    }

    /// Run until the frame limit is reached or the service is stopped.
    ///
    /// Must be called on a multi-threaded runtime: talking to the client
    /// blocks and runs inside `block_in_place`.
    pub async fn run(&self) -> Result<RunSummary, Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);
        let result = self.drive().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.keep_running.store(false, Ordering::SeqCst);
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn drive(&self) -> Result<RunSummary, Box<dyn std::error::Error>> {
        let cfg = &self.config;

        // A failed handshake reaps the client inside `with_options`.
        let mut server = tokio::task::block_in_place(|| {
            MediaFxServer::with_options(
                &cfg.client.path,
                cfg.client.config.clone(),
                cfg.frames.width,
                cfg.frames.height,
                cfg.frames.count,
                cfg.server_options(),
            )
        })?;
        info!(
            client = %cfg.client.path,
            pid = server.client_pid(),
            fps = cfg.fps(),
            limit = cfg.run.frames,
            "render client ready"
        );

        let result = self.pace(&mut server).await;
        // Dropping the server terminates the client.
        tokio::task::block_in_place(|| drop(server));
        let summary = result?;
        info!(frames = summary.frames, "host stopped");
        Ok(summary)
    }

    /// Render one frame per tick until the limit or a stop request.
    async fn pace(
        &self,
        server: &mut MediaFxServer,
    ) -> Result<RunSummary, Box<dyn std::error::Error>> {
        let cfg = &self.config;
        let mut output = match cfg.run.output.as_str() {
            "" => None,
            path => Some(BufWriter::new(File::create(path)?)),
        };

        let mut ticker = tokio::time::interval(cfg.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = RunSummary::default();

        while self.keep_running.load(Ordering::SeqCst)
            && (cfg.run.frames == 0 || summary.frames < cfg.run.frames)
        {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = Self::wait_for_stop(&self.keep_running) => break,
            }

            let frame = summary.frames;
            let digest =
                tokio::task::block_in_place(|| self.render_frame(server, frame, output.as_mut()));
            match digest {
                Ok(digest) => {
                    summary.frames += 1;
                    if digest.is_some() {
                        summary.last_digest = digest;
                    }
                }
                Err(e) => {
                    error!(frame, "render failed: {e}");
                    return Err(e);
                }
            }
        }

        if let Some(output) = output.as_mut() {
            output.flush()?;
        }
        Ok(summary)
    }

    /// Fill the sources, render one frame and record it.
    fn render_frame(
        &self,
        server: &mut MediaFxServer,
        frame: u64,
        output: Option<&mut BufWriter<File>>,
    ) -> Result<Option<String>, Box<dyn std::error::Error>> {
        let cfg = &self.config;
        for slot in 0..cfg.frames.count {
            test_pattern(server.source_frame_mut(slot)?, cfg.frames.width, frame, slot);
        }

        let time = frame as f64 / f64::from(cfg.fps());
        let data = RenderData::new(time, cfg.client.param1, cfg.client.param2, cfg.client.param3);
        let rendered: &[u8] = server.render(data)?;

        let digest = cfg.run.digest.then(|| blake3::hash(rendered).to_hex().to_string());
        match &digest {
            Some(digest) => info!(frame, time, %digest, "frame rendered"),
            None => debug!(frame, time, "frame rendered"),
        }
        if let Some(output) = output {
            output.write_all(rendered)?;
        }
        Ok(digest)
    }

    async fn wait_for_stop(keep_running: &Arc<AtomicBool>) {
        loop {
            if !keep_running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Deterministic RGBA gradient for source `slot` of frame `frame`.
///
/// Red follows the column, green the row, blue scrolls with the frame
/// number and alpha encodes the slot.
pub fn test_pattern(dest: &mut [u8], width: u32, frame: u64, slot: usize) {
    let width = width.max(1) as usize;
    let blue = (frame % 256) as u8;
    let alpha = 255u8.wrapping_sub((slot as u8).wrapping_mul(64));
    for (i, pixel) in dest.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
        let (x, y) = (i % width, i / width);
        pixel.copy_from_slice(&[x as u8, y as u8, blue, alpha]);
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! Video-host plugin adapter.
//!
//! Video hosts call effects with a fixed number of input frames and one
//! output frame per timestamp: sources take none, filters one, mixers two
//! or three. [`FrameServerPlugin`] forwards each call to a render client
//! through a [`MediaFxServer`], starting the client on first use.
//!
//! Pixels arrive as packed `u32` RGBA words and are copied into the
//! byte-oriented frame segment unchanged.

use std::marker::PhantomData;

use tracing::{error, info};

use crate::context::BYTES_PER_PIXEL;
use crate::error::MediaFxError;
use crate::message::RenderData;
use crate::server::{MediaFxServer, ServerOptions};

// ── PluginKind ───────────────────────────────────────────────────

/// Static description of a plugin flavour.
pub trait PluginKind {
    const NAME: &'static str;
    const EXPLANATION: &'static str;
    /// Number of input frames per call.
    const FRAME_COUNT: usize;
}

#[derive(Debug, Clone, Copy)]
pub struct Source;

#[derive(Debug, Clone, Copy)]
pub struct Filter;

#[derive(Debug, Clone, Copy)]
pub struct Mixer2;

#[derive(Debug, Clone, Copy)]
pub struct Mixer3;

impl PluginKind for Source {
    const NAME: &'static str = "MediaFX source";
    const EXPLANATION: &'static str = "Renders frames with a MediaFX source client";
    const FRAME_COUNT: usize = 0;
}

impl PluginKind for Filter {
    const NAME: &'static str = "MediaFX filter";
    const EXPLANATION: &'static str = "Filters frames with a MediaFX filter client";
    const FRAME_COUNT: usize = 1;
}

impl PluginKind for Mixer2 {
    const NAME: &'static str = "MediaFX mixer2";
    const EXPLANATION: &'static str = "Mixes two frames with a MediaFX mixer client";
    const FRAME_COUNT: usize = 2;
}

impl PluginKind for Mixer3 {
    const NAME: &'static str = "MediaFX mixer3";
    const EXPLANATION: &'static str = "Mixes three frames with a MediaFX mixer client";
    const FRAME_COUNT: usize = 3;
}

/// Metadata a host shows for a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: &'static str,
    pub explanation: &'static str,
    pub major_version: u32,
    pub minor_version: u32,
}

// ── PluginParams ─────────────────────────────────────────────────

/// User-facing plugin parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginParams {
    /// Render client executable path.
    pub client_path: String,
    /// Opaque configuration handed to the client.
    pub config: String,
    /// Client specific parameters, forwarded with every frame.
    pub param1: f64,
    pub param2: f64,
    pub param3: f64,
}

// ── FrameServerPlugin ────────────────────────────────────────────

/// One plugin instance bound to a frame size.
pub struct FrameServerPlugin<K: PluginKind> {
    width: u32,
    height: u32,
    params: PluginParams,
    options: ServerOptions,
    server: Option<MediaFxServer>,
    /// Set when the client could not be started with the current
    /// path/config; cleared when either changes.
    start_failed: bool,
    _kind: PhantomData<K>,
}

impl<K: PluginKind> std::fmt::Debug for FrameServerPlugin<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameServerPlugin")
            .field("kind", &K::NAME)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("params", &self.params)
            .field("running", &self.server.is_some())
            .finish()
    }
}

impl<K: PluginKind> FrameServerPlugin<K> {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_options(width, height, ServerOptions::default())
    }

    pub fn with_options(width: u32, height: u32, options: ServerOptions) -> Self {
        Self {
            width,
            height,
            params: PluginParams::default(),
            options,
            server: None,
            start_failed: false,
            _kind: PhantomData,
        }
    }

    pub fn info() -> PluginInfo {
        PluginInfo {
            name: K::NAME,
            explanation: K::EXPLANATION,
            major_version: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            minor_version: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        }
    }

    pub fn params(&self) -> &PluginParams {
        &self.params
    }

    /// Whether a render client is currently attached.
    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    /// Change the client program; a running client is replaced on the
    /// next update.
    pub fn set_client_path(&mut self, client_path: impl Into<String>) {
        let client_path = client_path.into();
        if client_path != self.params.client_path {
            self.params.client_path = client_path;
            self.restart();
        }
    }

    /// Change the client configuration; a running client is replaced on
    /// the next update.
    pub fn set_config(&mut self, config: impl Into<String>) {
        let config = config.into();
        if config != self.params.config {
            self.params.config = config;
            self.restart();
        }
    }

    /// Set the per-frame params; takes effect on the next update.
    pub fn set_params(&mut self, param1: f64, param2: f64, param3: f64) {
        self.params.param1 = param1;
        self.params.param2 = param2;
        self.params.param3 = param3;
    }

    /// Render one output frame at `time` from `inputs`.
    ///
    /// If the client cannot be started, `output` is left untouched and
    /// the call succeeds. On a render error the client is dropped and a
    /// fresh one is started by the next update.
    pub fn update(
        &mut self,
        time: f64,
        inputs: &[&[u32]],
        output: &mut [u32],
    ) -> Result<(), MediaFxError> {
        if inputs.len() != K::FRAME_COUNT {
            return Err(MediaFxError::FrameCountMismatch {
                expected: K::FRAME_COUNT,
                actual: inputs.len(),
            });
        }
        let pixels = self.width as usize * self.height as usize;
        for frame in inputs.iter().map(|input| input.len()).chain([output.len()]) {
            if frame != pixels {
                return Err(MediaFxError::FrameLength {
                    expected: pixels * BYTES_PER_PIXEL,
                    actual: frame * BYTES_PER_PIXEL,
                });
            }
        }

        let data = RenderData::new(
            time,
            self.params.param1,
            self.params.param2,
            self.params.param3,
        );
        let Some(server) = self.server() else {
            return Ok(());
        };
        if let Err(e) = Self::render_with(server, data, inputs, output) {
            error!(plugin = K::NAME, "failed to render frame: {e}");
            self.server = None;
            return Err(e);
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    fn render_with(
        server: &mut MediaFxServer,
        data: RenderData,
        inputs: &[&[u32]],
        output: &mut [u32],
    ) -> Result<(), MediaFxError> {
        for (index, input) in inputs.iter().enumerate() {
            let frame = server.source_frame_mut(index)?;
            for (bytes, pixel) in frame.chunks_exact_mut(BYTES_PER_PIXEL).zip(input.iter()) {
                bytes.copy_from_slice(&pixel.to_ne_bytes());
            }
        }
        let rendered = server.render(data)?;
        for (pixel, bytes) in output.iter_mut().zip(rendered.chunks_exact(BYTES_PER_PIXEL)) {
            *pixel = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        Ok(())
    }

    fn server(&mut self) -> Option<&mut MediaFxServer> {
        if self.server.is_none() && !self.start_failed {
            match MediaFxServer::with_options(
                &self.params.client_path,
                self.params.config.clone(),
                self.width,
                self.height,
                K::FRAME_COUNT,
                self.options.clone(),
            ) {
                Ok(server) => {
                    info!(
                        plugin = K::NAME,
                        client = %self.params.client_path,
                        "render client started"
                    );
                    self.server = Some(server);
                }
                Err(e) => {
                    error!(
                        plugin = K::NAME,
                        client = %self.params.client_path,
                        "failed to start render client: {e}"
                    );
                    self.start_failed = true;
                }
            }
        }
        self.server.as_mut()
    }

    fn restart(&mut self) {
        self.server = None;
        self.start_failed = false;
    }
}

// ── Per-kind entry points ────────────────────────────────────────

impl FrameServerPlugin<Source> {
    pub fn update_source(&mut self, time: f64, outframe: &mut [u32]) -> Result<(), MediaFxError> {
        self.update(time, &[], outframe)
    }
}

impl FrameServerPlugin<Filter> {
    pub fn update_filter(
        &mut self,
        time: f64,
        inframe: &[u32],
        outframe: &mut [u32],
    ) -> Result<(), MediaFxError> {
        self.update(time, &[inframe], outframe)
    }
}

impl FrameServerPlugin<Mixer2> {
    pub fn update_mixer2(
        &mut self,
        time: f64,
        inframe1: &[u32],
        inframe2: &[u32],
        outframe: &mut [u32],
    ) -> Result<(), MediaFxError> {
        self.update(time, &[inframe1, inframe2], outframe)
    }
}

impl FrameServerPlugin<Mixer3> {
    pub fn update_mixer3(
        &mut self,
        time: f64,
        inframe1: &[u32],
        inframe2: &[u32],
        inframe3: &[u32],
        outframe: &mut [u32],
    ) -> Result<(), MediaFxError> {
        self.update(time, &[inframe1, inframe2, inframe3], outframe)
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! # mediafx-clients: demo render clients
//!
//! Programs meant to be spawned by a MediaFX host. Each one attaches over
//! the inherited pipes, parses the host's config string as TOML and
//! renders frames until the host terminates it.
//!
//! - **mediafx-color**: source client filling the frame with one color
//! - **mediafx-shift**: filter client translating its source frame
//!
//! Logs go to stderr; stdout stays free for the effect's own output.

use serde::de::DeserializeOwned;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use mediafx_core::{MediaFxClient, MediaFxError, RenderFrame};

pub mod color;
pub mod shift;

/// Log level used before (or without) a valid client config.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Settings a client reads from the host's config string.
pub trait ClientConfig: DeserializeOwned + Default {
    fn log_level(&self) -> &str;
}

/// Parse the host's config string; an empty string means defaults.
pub fn parse_config<C: ClientConfig>(config: &str) -> Result<C, MediaFxError> {
    if config.trim().is_empty() {
        return Ok(C::default());
    }
    toml::from_str(config).map_err(|e| MediaFxError::Other(format!("invalid client config: {e}")))
}

/// Install the stderr subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Already installed when embedded in a larger program.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Attach to the spawning host and render with `effect` until terminated.
///
/// An invalid config rejects the handshake, so the host sees the parse
/// error instead of a closed pipe.
pub fn run<C, F>(effect: F) -> Result<(), MediaFxError>
where
    C: ClientConfig,
    F: FnMut(&C, &mut RenderFrame) -> Result<(), MediaFxError>,
{
    let attached = MediaFxClient::new_with(parse_config::<C>);
    init_tracing(attached.as_ref().map_or(DEFAULT_LOG_LEVEL, |(_, c)| c.log_level()));
    let (client, config) = attached.inspect_err(|e| error!("attach failed: {e}"))?;

    info!(size = ?client.render_size(), "render client attached");
    serve(client, &config, effect)
}

/// Render loop over an attached client.
///
/// A failing effect aborts its frame and the loop continues. Returns
/// `Ok` once the host sends `Terminate`.
pub fn serve<C, F>(
    mut client: MediaFxClient,
    config: &C,
    mut effect: F,
) -> Result<(), MediaFxError>
where
    F: FnMut(&C, &mut RenderFrame) -> Result<(), MediaFxError>,
{
    let mut rendered = 0u64;
    loop {
        let mut frame = match client.render_frame() {
            Ok(frame) => frame,
            Err((_, e)) if e.is_terminated() => {
                info!(rendered, "terminated by host");
                return Ok(());
            }
            Err((_, e)) => return Err(e),
        };
        let next = match effect(config, &mut frame) {
            Ok(()) => {
                rendered += 1;
                debug!(time = frame.render_data().time, "frame rendered");
                frame.commit()
            }
            Err(e) => frame.abort(e.to_string()),
        };
        client = next.map_err(|(_, e)| e)?;
    }
}

// ── Tests ────────────────────────────────────────────────────────

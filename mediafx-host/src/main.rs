//! MediaFX host: entry point.
//!
//! ```text
//! mediafx-host                          Run with mediafx-host.toml (or defaults)
//! mediafx-host --config <path>          Load a custom config TOML
//! mediafx-host --client mediafx-shift --count 1 --param1 0.5
//! mediafx-host --gen-config             Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mediafx_host::config::HostConfig;
use mediafx_host::service::HostService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mediafx-host", about = "Drive a MediaFX render client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "mediafx-host.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Render client executable.
    #[arg(long)]
    client: Option<String>,

    /// Config string handed to the client.
    #[arg(long)]
    client_config: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Source frames per request.
    #[arg(long)]
    count: Option<usize>,

    #[arg(long)]
    param1: Option<f64>,

    #[arg(long)]
    param2: Option<f64>,

    #[arg(long)]
    param3: Option<f64>,

    /// Target frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Stop after this many frames (0 = until Ctrl-C).
    #[arg(long)]
    frames: Option<u64>,

    /// Log a blake3 digest of every rendered frame.
    #[arg(long)]
    digest: bool,

    /// Write raw RGBA rendered frames to this file.
    #[arg(short, long)]
    output: Option<String>,
}

impl Cli {
    /// Command-line values win over the config file.
    fn apply(self, config: &mut HostConfig) {
        if let Some(client) = self.client {
            config.client.path = client;
        }
        if let Some(client_config) = self.client_config {
            config.client.config = client_config;
        }
        if let Some(width) = self.width {
            config.frames.width = width;
        }
        if let Some(height) = self.height {
            config.frames.height = height;
        }
        if let Some(count) = self.count {
            config.frames.count = count;
        }
        if let Some(param1) = self.param1 {
            config.client.param1 = param1;
        }
        if let Some(param2) = self.param2 {
            config.client.param2 = param2;
        }
        if let Some(param3) = self.param3 {
            config.client.param3 = param3;
        }
        if let Some(fps) = self.fps {
            config.run.fps = fps;
        }
        if let Some(frames) = self.frames {
            config.run.frames = frames;
        }
        if self.digest {
            config.run.digest = true;
        }
        if let Some(output) = self.output {
            config.run.output = output;
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&HostConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, then let the command line override it.
    let mut config = HostConfig::load(&cli.config);
    cli.apply(&mut config);

    // Init tracing on stderr; stdout belongs to the client.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("mediafx-host v{}", env!("CARGO_PKG_VERSION"));
    info!("client: {}", config.client.path);
    info!(
        "frames: {}x{} with {} sources",
        config.frames.width, config.frames.height, config.frames.count
    );
    info!("target FPS: {}", config.fps());

    let service = HostService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    let stop_clone = stop.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop_clone.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    let summary = service.run().await?;
    info!("rendered {} frames", summary.frames);

    Ok(())
}

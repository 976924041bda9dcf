//! Configuration for the host driver.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mediafx_core::ServerOptions;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Render client to spawn.
    pub client: ClientConfig,
    /// Frame geometry.
    pub frames: FramesConfig,
    /// Pacing and output.
    pub run: RunConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Render client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client executable; looked up on `PATH` when not a path.
    pub path: String,
    /// Extra arguments for the client.
    pub args: Vec<String>,
    /// Opaque config string handed over in the handshake.
    pub config: String,
    /// Client specific params sent with every frame.
    pub param1: f64,
    pub param2: f64,
    pub param3: f64,
}

/// Frame geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramesConfig {
    pub width: u32,
    pub height: u32,
    /// Source frames per request (0 for source clients).
    pub count: usize,
}

/// Pacing and output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Target frames per second.
    pub fps: u32,
    /// Stop after this many frames (0 = until Ctrl-C).
    pub frames: u64,
    /// Log a blake3 digest of every rendered frame.
    pub digest: bool,
    /// Append raw RGBA rendered frames to this file. Empty disables.
    pub output: String,
    /// Grace period for the client to exit before it is killed.
    pub terminate_timeout_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            frames: FramesConfig::default(),
            run: RunConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            path: "mediafx-color".into(),
            args: Vec::new(),
            config: String::new(),
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
        }
    }
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            count: 0,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            frames: 300,
            digest: false,
            output: String::new(),
            terminate_timeout_ms: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl HostConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Effective frame rate, kept within 1..=240.
    pub fn fps(&self) -> u32 {
        self.run.fps.clamp(1, 240)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps()
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            args: self.client.args.clone(),
            terminate_timeout: Duration::from_millis(self.run.terminate_timeout_ms),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = HostConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("[client]"));
        assert!(text.contains("fps"));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: HostConfig = toml::from_str(
            r#"
            [client]
            path = "mediafx-shift"
            param1 = 0.5

            [frames]
            count = 1
            "#,
        )
        .unwrap();
        assert_eq!(cfg.client.path, "mediafx-shift");
        assert_eq!(cfg.client.param1, 0.5);
        assert_eq!(cfg.frames.count, 1);
        assert_eq!(cfg.frames.width, 640);
        assert_eq!(cfg.run.fps, 30);
    }

    #[test]
    fn missing_file_is_default() {
        let cfg = HostConfig::load(Path::new("/nonexistent/mediafx-host.toml"));
        assert_eq!(cfg.client.path, "mediafx-color");
    }

    #[test]
    fn fps_is_clamped() {
        let mut cfg = HostConfig::default();
        cfg.run.fps = 0;
        assert_eq!(cfg.fps(), 1);
        cfg.run.fps = 1000;
        assert_eq!(cfg.fps(), 240);
        cfg.run.fps = 50;
        assert_eq!(cfg.frame_interval(), Duration::from_millis(20));
    }

    #[test]
    fn server_options_from_config() {
        let mut cfg = HostConfig::default();
        cfg.client.args = vec!["--verbose".into()];
        cfg.run.terminate_timeout_ms = 250;
        let options = cfg.server_options();
        assert_eq!(options.args, ["--verbose"]);
        assert_eq!(options.terminate_timeout, Duration::from_millis(250));
    }
}

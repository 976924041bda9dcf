//! Solid-color source client.

use serde::{Deserialize, Serialize};

use mediafx_core::effects::{cycle_color, fill, param_color};
use mediafx_core::{MediaFxError, RenderFrame};

use crate::{ClientConfig, DEFAULT_LOG_LEVEL};

/// Where the fill color comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Cycle with the frame time.
    #[default]
    Cycle,
    /// `param1..3` as red, green and blue in `[0, 1]`.
    Params,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub log_level: String,
    pub mode: ColorMode,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.into(),
            mode: ColorMode::Cycle,
        }
    }
}

impl ClientConfig for ColorConfig {
    fn log_level(&self) -> &str {
        &self.log_level
    }
}

pub fn render(config: &ColorConfig, frame: &mut RenderFrame) -> Result<(), MediaFxError> {
    let data = *frame.render_data();
    let rgba = match config.mode {
        ColorMode::Cycle => cycle_color(data.time),
        ColorMode::Params => param_color(data.param1, data.param2, data.param3),
    };
    fill(frame.rendered_frame_mut(), rgba);
    Ok(())
}

//! Translating filter client.
//!
//! Shifts source frame 0 by `(param1, param2)` as fractions of the frame
//! width and height, wrapping around the edges. `xshift`/`yshift` in the
//! config pin either axis regardless of the params.

use serde::{Deserialize, Serialize};

use mediafx_core::effects;
use mediafx_core::{MediaFxError, RenderFrame};

use crate::{ClientConfig, DEFAULT_LOG_LEVEL};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftConfig {
    pub log_level: String,
    pub xshift: Option<f64>,
    pub yshift: Option<f64>,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.into(),
            xshift: None,
            yshift: None,
        }
    }
}

impl ClientConfig for ShiftConfig {
    fn log_level(&self) -> &str {
        &self.log_level
    }
}

pub fn render(config: &ShiftConfig, frame: &mut RenderFrame) -> Result<(), MediaFxError> {
    let data = *frame.render_data();
    let size = frame.render_size();
    let xshift = config.xshift.unwrap_or(data.param1);
    let yshift = config.yshift.unwrap_or(data.param2);
    let ([source], dest) = frame.frames_with_rendered_frame_mut::<1>()?;
    effects::shift(source, dest, size.width(), size.height(), xshift, yshift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config;
    use crate::tests::Host;
    use mediafx_core::RenderData;

    fn indexed(host: &mut Host) {
        for (i, pixel) in host.source_mut(0).chunks_exact_mut(4).enumerate() {
            pixel.fill(i as u8);
        }
    }

    #[test]
    fn shifts_by_params() {
        let mut host = Host::new(4, 1, 1, "")
            .request(RenderData::new(0.0, 0.5, 0.0, 0.0))
            .terminate();
        indexed(&mut host);
        let (client, _) = host.attach();
        crate::serve(client, &ShiftConfig::default(), render).unwrap();

        let firsts: Vec<u8> = host.rendered().chunks_exact(4).map(|p| p[0]).collect();
        assert_eq!(firsts, [2, 3, 0, 1]);
    }

    #[test]
    fn config_overrides_params() {
        let mut host = Host::new(4, 1, 1, "")
            .request(RenderData::new(0.0, 0.5, 0.0, 0.0))
            .terminate();
        indexed(&mut host);
        let (client, _) = host.attach();
        let config: ShiftConfig = parse_config("xshift = 0.25").unwrap();
        crate::serve(client, &config, render).unwrap();

        let firsts: Vec<u8> = host.rendered().chunks_exact(4).map(|p| p[0]).collect();
        assert_eq!(firsts, [1, 2, 3, 0]);
    }

    #[test]
    fn missing_source_aborts_frame() {
        let host = Host::new(2, 2, 0, "")
            .request(RenderData::default())
            .terminate();
        let (client, acks) = host.attach();
        crate::serve(client, &ShiftConfig::default(), render).unwrap();

        let acks = acks.decode();
        assert_eq!(acks.len(), 2);
        assert!(!acks[1].is_ok());
    }
}

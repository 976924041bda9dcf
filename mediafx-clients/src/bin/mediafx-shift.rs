//! Translating MediaFX filter client.
//!
//! ```text
//! xshift = 0.5      # optional, overrides param1
//! yshift = 0.25     # optional, overrides param2
//! ```

use mediafx_clients::shift::{self, ShiftConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    mediafx_clients::run::<ShiftConfig, _>(shift::render)?;
    Ok(())
}

//! Solid-color MediaFX source client.
//!
//! ```text
//! mode = "cycle"    # color keyed on frame time (default)
//! mode = "params"   # param1..3 as red, green, blue
//! ```

use mediafx_clients::color::{self, ColorConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    mediafx_clients::run::<ColorConfig, _>(color::render)?;
    Ok(())
}

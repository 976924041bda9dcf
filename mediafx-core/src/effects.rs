//! Pixel effects used by the bundled render clients.
//!
//! All frames are tightly packed RGBA8888, `width * height * 4` bytes.

use crate::context::BYTES_PER_PIXEL;
use crate::error::MediaFxError;

// ── Shift ────────────────────────────────────────────────────────

/// Toroidal translation of `source` into `dest`.
///
/// Destination pixel `(dx, dy)` receives source pixel
/// `((dx + xs) mod width, (dy + ys) mod height)` where
/// `xs = trunc(xshift * width)` and `ys = trunc(yshift * height)`.
/// Shifts of any sign or magnitude wrap around.
pub fn shift(
    source: &[u8],
    dest: &mut [u8],
    width: u32,
    height: u32,
    xshift: f64,
    yshift: f64,
) -> Result<(), MediaFxError> {
    let (w, h) = (width as usize, height as usize);
    let expected = w * h * BYTES_PER_PIXEL;
    check_len(expected, source.len())?;
    check_len(expected, dest.len())?;
    if expected == 0 {
        return Ok(());
    }

    let xs = wrap(xshift, w) * BYTES_PER_PIXEL;
    let ys = wrap(yshift, h);
    let stride = w * BYTES_PER_PIXEL;

    for (dy, dest_row) in dest.chunks_exact_mut(stride).enumerate() {
        let sy = (dy + ys) % h;
        let source_row = &source[sy * stride..(sy + 1) * stride];
        // A row shift is a left rotation by `xs` bytes.
        let (head, tail) = source_row.split_at(xs);
        dest_row[..tail.len()].copy_from_slice(tail);
        dest_row[tail.len()..].copy_from_slice(head);
    }
    Ok(())
}

/// `trunc(fraction * extent)` reduced into `0..extent`.
fn wrap(fraction: f64, extent: usize) -> usize {
    let pixels = (fraction * extent as f64) as i64;
    pixels.rem_euclid(extent as i64) as usize
}

// ── Color ────────────────────────────────────────────────────────

/// Fill every pixel of `dest` with `rgba`.
pub fn fill(dest: &mut [u8], rgba: [u8; 4]) {
    for pixel in dest.chunks_exact_mut(BYTES_PER_PIXEL) {
        pixel.copy_from_slice(&rgba);
    }
}

/// Time-keyed color cycle: red tracks `time mod 255`, blue runs half a
/// cycle ahead, green is off and alpha is opaque.
pub fn cycle_color(time: f64) -> [u8; 4] {
    let r = time.rem_euclid(255.0) as u8;
    let b = (time + 128.0).rem_euclid(255.0) as u8;
    [r, 0, b, 255]
}

/// Opaque color from three unit-range params.
pub fn param_color(red: f64, green: f64, blue: f64) -> [u8; 4] {
    let channel = |value: f64| (value.clamp(0.0, 1.0) * 255.0) as u8;
    [channel(red), channel(green), channel(blue), 255]
}

fn check_len(expected: usize, actual: usize) -> Result<(), MediaFxError> {
    if expected != actual {
        return Err(MediaFxError::FrameLength { expected, actual });
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────

//! Frame geometry and the shared frame segment.
//!
//! The segment holds `count` source frames followed by one rendered
//! frame, each `width * height` RGBA8888 pixels:
//!
//! ```text
//! ┌──────────┬──────────┬─────┬──────────────┬────────────────┐
//! │ source 0 │ source 1 │ ... │ source N - 1 │ rendered frame │
//! └──────────┴──────────┴─────┴──────────────┴────────────────┘
//! ```
//!
//! The host writes source frames and reads the rendered frame; the
//! client does the opposite. The request/acknowledge exchange in
//! [`crate::message`] decides which side may touch the segment.

use std::array;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use shared_memory::Shmem;

use crate::error::MediaFxError;

/// RGBA8888.
pub const BYTES_PER_PIXEL: usize = 4;

// ── RenderSize ───────────────────────────────────────────────────

/// Dimensions of every frame in the segment plus the number of source frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSize {
    width: u32,
    height: u32,
    /// Number of source frame images, does not count the rendered frame.
    count: usize,
}

impl RenderSize {
    /// Validate and build a size.
    ///
    /// Width and height must be non-zero and the whole segment must be
    /// addressable.
    pub fn new(width: u32, height: u32, count: usize) -> Result<Self, MediaFxError> {
        if width == 0 || height == 0 {
            return Err(MediaFxError::InvalidSize(format!(
                "{width}x{height} has no pixels"
            )));
        }
        let size = RenderSize {
            width,
            height,
            count,
        };
        size.checked_memory_size().ok_or_else(|| {
            MediaFxError::InvalidSize(format!("{width}x{height} x {count} frames overflows"))
        })?;
        Ok(size)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Bytes in a single frame.
    pub fn frame_bytecount(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Bytes in the whole segment, source frames plus the rendered frame.
    pub fn memory_size(&self) -> usize {
        self.frame_bytecount() * (self.count + 1)
    }

    fn checked_memory_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(BYTES_PER_PIXEL)?
            .checked_mul(self.count.checked_add(1)?)
    }

    /// Byte range of frame `index`; `index == count` is the rendered frame.
    fn frame_range(&self, index: usize) -> Range<usize> {
        let bytecount = self.frame_bytecount();
        let offset = index * bytecount;
        offset..offset + bytecount
    }
}

// ── RenderContext ────────────────────────────────────────────────

/// Typed view over the shared frame segment.
pub struct RenderContext {
    size: RenderSize,
    shmem: Shmem,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("size", &self.size)
            .field("os_id", &self.shmem.get_os_id())
            .finish()
    }
}

// Safety: the mapping is owned by this context and only reached through
// `&self`/`&mut self`, so moving it to another thread is sound.
unsafe impl Send for RenderContext {}

impl RenderContext {
    /// Wrap a mapped segment. The mapping must cover `size.memory_size()`.
    pub fn new(size: RenderSize, shmem: Shmem) -> Result<Self, MediaFxError> {
        if shmem.len() < size.memory_size() {
            return Err(MediaFxError::InvalidSize(format!(
                "shared segment is {} bytes, need {}",
                shmem.len(),
                size.memory_size()
            )));
        }
        Ok(RenderContext { size, shmem })
    }

    pub fn render_size(&self) -> RenderSize {
        self.size
    }

    /// OS identifier the peer uses to attach to the segment.
    pub fn os_id(&self) -> &str {
        self.shmem.get_os_id()
    }

    // ── Single frames ────────────────────────────────────────────

    pub fn frame(&self, index: usize) -> Result<&[u8], MediaFxError> {
        self.check_frame(index)?;
        let range = self.size.frame_range(index);
        Ok(&self.bytes()[range])
    }

    pub fn frame_mut(&mut self, index: usize) -> Result<&mut [u8], MediaFxError> {
        self.check_frame(index)?;
        let range = self.size.frame_range(index);
        Ok(&mut self.bytes_mut()[range])
    }

    pub fn rendered_frame(&self) -> &[u8] {
        let range = self.size.frame_range(self.size.count);
        &self.bytes()[range]
    }

    pub fn rendered_frame_mut(&mut self) -> &mut [u8] {
        let range = self.size.frame_range(self.size.count);
        &mut self.bytes_mut()[range]
    }

    // ── Frame groups ─────────────────────────────────────────────

    /// The first `N` source frames.
    pub fn frames<const N: usize>(&self) -> Result<[&[u8]; N], MediaFxError> {
        self.check_group::<N>()?;
        let bytecount = self.size.frame_bytecount();
        Ok(split(self.bytes(), bytecount))
    }

    /// The first `N` source frames, mutably.
    pub fn frames_mut<const N: usize>(&mut self) -> Result<[&mut [u8]; N], MediaFxError> {
        self.check_group::<N>()?;
        let bytecount = self.size.frame_bytecount();
        Ok(split_mut(self.bytes_mut(), bytecount))
    }

    /// The first `N` source frames together with the mutable rendered frame.
    #[allow(clippy::type_complexity)]
    pub fn frames_with_rendered_frame_mut<const N: usize>(
        &mut self,
    ) -> Result<([&[u8]; N], &mut [u8]), MediaFxError> {
        self.check_group::<N>()?;
        let bytecount = self.size.frame_bytecount();
        let sources_len = bytecount * self.size.count;
        let (sources, rendered) = self.bytes_mut().split_at_mut(sources_len);
        Ok((split(sources, bytecount), &mut rendered[..bytecount]))
    }

    // ── Internal ─────────────────────────────────────────────────

    fn bytes(&self) -> &[u8] {
        let len = self.size.memory_size();
        // Safety: the mapping is at least `len` bytes (checked in `new`).
        unsafe { &self.shmem.as_slice()[..len] }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.size.memory_size();
        // Safety: as above; `&mut self` makes this the only live view.
        unsafe { &mut self.shmem.as_slice_mut()[..len] }
    }

    fn check_frame(&self, index: usize) -> Result<(), MediaFxError> {
        if index >= self.size.count {
            return Err(MediaFxError::FrameOutOfRange {
                index,
                count: self.size.count,
            });
        }
        Ok(())
    }

    fn check_group<const N: usize>(&self) -> Result<(), MediaFxError> {
        if N > self.size.count {
            return Err(MediaFxError::FrameOutOfRange {
                index: N - 1,
                count: self.size.count,
            });
        }
        Ok(())
    }
}

fn split<const N: usize>(bytes: &[u8], bytecount: usize) -> [&[u8]; N] {
    array::from_fn(|i| &bytes[i * bytecount..(i + 1) * bytecount])
}

fn split_mut<const N: usize>(bytes: &mut [u8], bytecount: usize) -> [&mut [u8]; N] {
    let mut chunks = bytes.chunks_exact_mut(bytecount);
    array::from_fn(|_| chunks.next().unwrap_or_default())
}

// ── Tests ────────────────────────────────────────────────────────

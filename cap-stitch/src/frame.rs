// SPDX-License-Identifier: MIT
//! # Captured Frames
//!
//! A [`Frame`] is one immutable screen capture: a 4-byte-per-pixel buffer plus
//! the geometry needed to address it. Buffers are `Arc`-shared so a frame can
//! be handed to the detector, the session list and the stitching worker
//! without copying pixels.
//!
//! ## Memory Layout
//! - 4 bytes per pixel, channel order given by [`PixelFormat`]
//! - Stride-aware: rows may carry padding beyond `width * 4` bytes
//! - The last row only needs `width * 4` bytes (no trailing padding required)

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{StitchError, StitchResult};

/// Bytes per pixel for every supported format.
pub const BYTES_PER_PIXEL: usize = 4;

/// Channel order of a frame buffer. Both layouts keep alpha in the last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Blue, green, red, alpha (native order of most capture APIs)
    Bgra8,
    /// Red, green, blue, alpha (native order of decoded image files)
    Rgba8,
}

/// One immutable captured pixel buffer for a single scroll position.
#[derive(Clone, PartialEq)]
pub struct Frame {
    /// Capture ordinal within its session (0 until the session assigns one).
    pub index: usize,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row (may exceed `width * 4` due to padding)
    pub stride: usize,
    /// Channel order
    pub format: PixelFormat,
    /// Capture time in nanoseconds, relative to whatever clock the source uses
    pub timestamp_ns: u64,
    data: Arc<Vec<u8>>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("timestamp_ns", &self.timestamp_ns)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Frame {
    /// Wrap a pixel buffer, validating it against the declared geometry.
    ///
    /// # Errors
    /// [`StitchError::InvalidBuffer`] if the frame is empty, the stride cannot
    /// hold a row, or the buffer is shorter than `stride * (height - 1) + width * 4`.
    pub fn new(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        timestamp_ns: u64,
        data: impl Into<Arc<Vec<u8>>>,
    ) -> StitchResult<Self> {
        let data = data.into();
        if width == 0 || height == 0 {
            return Err(StitchError::invalid_buffer(format!(
                "frame must be non-empty, got {}x{}",
                width, height
            )));
        }
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if stride < row_bytes {
            return Err(StitchError::invalid_buffer(format!(
                "stride {} is smaller than a {}px row ({} bytes)",
                stride, width, row_bytes
            )));
        }
        let required = stride
            .checked_mul(height as usize - 1)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or_else(|| StitchError::invalid_buffer("frame geometry overflows usize"))?;
        if data.len() < required {
            return Err(StitchError::invalid_buffer(format!(
                "buffer holds {} bytes but {}x{} with stride {} needs {}",
                data.len(),
                width,
                height,
                stride,
                required
            )));
        }
        Ok(Self {
            index: 0,
            width,
            height,
            stride,
            format,
            timestamp_ns,
            data,
        })
    }

    /// Wrap a tightly packed buffer (`stride == width * 4`).
    pub fn packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Arc<Vec<u8>>>,
    ) -> StitchResult<Self> {
        Self::new(
            width,
            height,
            width as usize * BYTES_PER_PIXEL,
            format,
            0,
            data,
        )
    }

    /// Same pixels, new session ordinal. The buffer is shared, not copied.
    pub fn with_index(&self, index: usize) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }

    /// Raw backing buffer, including any stride padding.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixel bytes of row `y`, without stride padding.
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    /// The four bytes of pixel `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        &self.data[start..start + BYTES_PER_PIXEL]
    }

    /// Bytes in one unpadded row.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Copy a sub-rectangle into a new, tightly packed frame.
    ///
    /// # Errors
    /// [`StitchError::InvalidBuffer`] if the rectangle is empty or leaves the frame.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> StitchResult<Frame> {
        let fits_x = x.checked_add(width).is_some_and(|r| r <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|b| b <= self.height);
        if width == 0 || height == 0 || !fits_x || !fits_y {
            return Err(StitchError::invalid_buffer(format!(
                "crop {}x{}+{}+{} outside {}x{} frame",
                width, height, x, y, self.width, self.height
            )));
        }

        let out_row = width as usize * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(out_row * height as usize);
        let x_off = x as usize * BYTES_PER_PIXEL;
        for row in y..y + height {
            out.extend_from_slice(&self.row(row)[x_off..x_off + out_row]);
        }

        let mut frame = Frame::packed(width, height, self.format, out)?;
        frame.index = self.index;
        frame.timestamp_ns = self.timestamp_ns;
        Ok(frame)
    }

    /// Copy the pixels into a packed RGBA buffer (swizzling BGRA if needed).
    pub fn to_rgba_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.row_bytes() * self.height as usize);
        for y in 0..self.height {
            let row = self.row(y);
            match self.format {
                PixelFormat::Rgba8 => out.extend_from_slice(row),
                PixelFormat::Bgra8 => {
                    for px in row.chunks_exact(BYTES_PER_PIXEL) {
                        out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                    }
                }
            }
        }
        out
    }
}

/// True when every colour channel of two pixels differs by at most `tolerance`.
/// Alpha is ignored: captures of the same content can disagree on it.
#[inline]
pub fn pixels_match(a: &[u8], b: &[u8], tolerance: u8) -> bool {
    a[0].abs_diff(b[0]) <= tolerance
        && a[1].abs_diff(b[1]) <= tolerance
        && a[2].abs_diff(b[2]) <= tolerance
}

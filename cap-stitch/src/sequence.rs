// SPDX-License-Identifier: MIT
//! # Frame Sequence
//!
//! The append-only, capture-ordered frame list owned by one session.
//! Insertion order is capture order is vertical scroll order. Every frame must
//! share the first frame's width and pixel format; a mismatch is rejected, not
//! skipped, because a misaligned frame would corrupt every row below it.

use std::sync::Arc;

use crate::error::{StitchError, StitchResult};
use crate::frame::{Frame, PixelFormat};

/// Append-only list of frames with a shared width and pixel format.
#[derive(Debug, Default)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame, assigning it the next ordinal.
    ///
    /// Returns the assigned index.
    ///
    /// # Errors
    /// [`StitchError::DimensionMismatch`] or [`StitchError::PixelFormatMismatch`]
    /// when the frame disagrees with the first frame of the sequence.
    pub fn append(&mut self, frame: Frame) -> StitchResult<usize> {
        let index = self.frames.len();
        if let Some((width, format)) = self.geometry() {
            if frame.width != width {
                return Err(StitchError::DimensionMismatch {
                    expected_width: width,
                    found_width: frame.width,
                    frame_index: index,
                });
            }
            if frame.format != format {
                return Err(StitchError::PixelFormatMismatch {
                    expected: format,
                    found: frame.format,
                    frame_index: index,
                });
            }
        }
        self.frames.push(frame.with_index(index));
        Ok(index)
    }

    /// Width and pixel format every frame must share, once known.
    pub fn geometry(&self) -> Option<(u32, PixelFormat)> {
        self.frames.first().map(|f| (f.width, f.format))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn last(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Consume the sequence into an immutable snapshot.
    pub fn freeze(self) -> Arc<[Frame]> {
        self.frames.into()
    }
}

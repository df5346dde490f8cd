// SPDX-License-Identifier: MIT
//! # Stitch Plans
//!
//! A [`StitchPlan`] says how many rows of each frame survive into the final
//! image. Frame `i` keeps its top `height - overlap(i, i + 1)` rows; the last
//! frame is kept whole. A frame fully covered by its successor keeps nothing.
//!
//! ```text
//! frame 0  ┌──────────┐ rows kept ┐
//!          │          │           │
//!          ├──────────┤ ┐         ┘  overlap(0,1): reproduced by frame 1
//!          └──────────┘ ┘
//! frame 1  ┌──────────┐ rows kept ┐
//!          │          │           │
//!          └──────────┘           ┘
//! ```
//!
//! Output height is always `Σ height - Σ overlap`.

use serde::Serialize;

use crate::error::{StitchError, StitchResult};
use crate::frame::{Frame, PixelFormat};
use crate::overlap::OverlapResult;

/// Rows `use_row_start..use_row_end` of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub frame_index: usize,
    pub use_row_start: u32,
    pub use_row_end: u32,
}

impl PlanEntry {
    /// Number of output rows this frame contributes.
    pub fn rows(&self) -> u32 {
        self.use_row_end - self.use_row_start
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }
}

/// Ordered per-frame row ranges for one stitch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StitchPlan {
    pub width: u32,
    pub format: PixelFormat,
    pub entries: Vec<PlanEntry>,
}

impl StitchPlan {
    /// Build a plan from capture-ordered frames and their adjacent overlaps.
    ///
    /// # Errors
    /// - [`StitchError::NoFrames`] for an empty frame list
    /// - [`StitchError::OverlapCountMismatch`] unless `overlaps.len() == frames.len() - 1`
    /// - [`StitchError::DimensionMismatch`] / [`StitchError::PixelFormatMismatch`]
    /// - [`StitchError::OverlapOutOfRange`] if an overlap exceeds either frame it joins
    pub fn from_overlaps(frames: &[Frame], overlaps: &[OverlapResult]) -> StitchResult<Self> {
        let first = frames.first().ok_or(StitchError::NoFrames)?;
        if overlaps.len() + 1 != frames.len() {
            return Err(StitchError::OverlapCountMismatch {
                frames: frames.len(),
                overlaps: overlaps.len(),
            });
        }

        for (position, frame) in frames.iter().enumerate().skip(1) {
            if frame.width != first.width {
                return Err(StitchError::DimensionMismatch {
                    expected_width: first.width,
                    found_width: frame.width,
                    frame_index: position,
                });
            }
            if frame.format != first.format {
                return Err(StitchError::PixelFormatMismatch {
                    expected: first.format,
                    found: frame.format,
                    frame_index: position,
                });
            }
        }

        let mut entries = Vec::with_capacity(frames.len());
        for (pair, overlap) in frames.windows(2).zip(overlaps) {
            let (top, bottom) = (&pair[0], &pair[1]);
            let limit = top.height.min(bottom.height);
            if overlap.overlap_rows > limit {
                return Err(StitchError::OverlapOutOfRange {
                    top_index: top.index,
                    bottom_index: bottom.index,
                    overlap_rows: overlap.overlap_rows,
                    reason: format!("exceeds the shorter frame ({} rows)", limit),
                });
            }
            entries.push(PlanEntry {
                frame_index: top.index,
                use_row_start: 0,
                use_row_end: top.height - overlap.overlap_rows,
            });
        }

        let last = &frames[frames.len() - 1];
        entries.push(PlanEntry {
            frame_index: last.index,
            use_row_start: 0,
            use_row_end: last.height,
        });

        let plan = Self {
            width: first.width,
            format: first.format,
            entries,
        };
        if plan.output_height() == 0 {
            return Err(StitchError::EmptyOutput);
        }
        Ok(plan)
    }

    /// Total rows of the stitched image.
    pub fn output_height(&self) -> u32 {
        self.entries.iter().map(PlanEntry::rows).sum()
    }

    /// Frames that contribute no rows.
    pub fn skipped_frames(&self) -> usize {
        self.entries.iter().filter(|e| e.is_empty()).count()
    }
}

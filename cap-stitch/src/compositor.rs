// SPDX-License-Identifier: MIT
//! # Compositor
//!
//! Renders a [`StitchPlan`] into one image. The destination buffer is sized up
//! front and owned exclusively by the render call until it is moved into the
//! returned [`Frame`]; there is no shared drawing surface.
//!
//! Frames are placed bottom-up: the last frame lands at the bottom of the
//! canvas, and each earlier frame's kept rows go directly above whatever was
//! placed before it. Frames with an empty range are skipped, which is how a
//! run of duplicate captures collapses to a single copy.

use tracing::{debug, trace};

use crate::error::{StitchError, StitchResult};
use crate::frame::{Frame, BYTES_PER_PIXEL};
use crate::overlap::OverlapResult;
use crate::plan::StitchPlan;

/// Assembles capture-ordered frames into one seamless image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    pub fn new() -> Self {
        Self
    }

    /// Stitch frames using the overlaps between each adjacent pair.
    ///
    /// A single frame is returned unchanged.
    ///
    /// # Errors
    /// Everything [`StitchPlan::from_overlaps`] rejects.
    pub fn stitch(&self, frames: &[Frame], overlaps: &[OverlapResult]) -> StitchResult<Frame> {
        let plan = StitchPlan::from_overlaps(frames, overlaps)?;
        if let [only] = frames {
            return Ok(only.clone());
        }
        self.render(frames, &plan)
    }

    /// Render an already validated plan.
    ///
    /// # Errors
    /// [`StitchError::PlanMismatch`] if the plan was built for a different
    /// number of frames, [`StitchError::EmptyOutput`] if it keeps no rows.
    pub fn render(&self, frames: &[Frame], plan: &StitchPlan) -> StitchResult<Frame> {
        if plan.entries.len() != frames.len() {
            return Err(StitchError::PlanMismatch {
                plan_frames: plan.entries.len(),
                frames: frames.len(),
            });
        }
        let height = plan.output_height();
        if height == 0 {
            return Err(StitchError::EmptyOutput);
        }

        let row_bytes = plan.width as usize * BYTES_PER_PIXEL;
        let mut canvas = vec![0u8; row_bytes * height as usize];
        let mut cursor = height;

        for (frame, entry) in frames.iter().zip(&plan.entries).rev() {
            if entry.is_empty() {
                trace!(frame = entry.frame_index, "fully overlapped, skipped");
                continue;
            }
            cursor -= entry.rows();
            for (offset, y) in (entry.use_row_start..entry.use_row_end).enumerate() {
                let dst = (cursor as usize + offset) * row_bytes;
                canvas[dst..dst + row_bytes].copy_from_slice(frame.row(y));
            }
        }
        debug_assert_eq!(cursor, 0);

        debug!(
            frames = frames.len(),
            skipped = plan.skipped_frames(),
            width = plan.width,
            height,
            "stitched"
        );

        let timestamp_ns = frames.last().map_or(0, |f| f.timestamp_ns);
        Frame::new(plan.width, height, row_bytes, plan.format, timestamp_ns, canvas)
    }
}

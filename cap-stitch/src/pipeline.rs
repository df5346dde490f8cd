// SPDX-License-Identifier: MIT
//! # Stitch Pipeline
//!
//! Pairwise overlap search followed by compositing. This is the whole
//! `Stitching` stage of a capture session and also what offline replay runs.

use serde::Serialize;
use tracing::info;

use crate::compositor::Compositor;
use crate::config::OverlapConfig;
use crate::error::{StitchError, StitchResult};
use crate::frame::Frame;
use crate::overlap::{OverlapFinder, OverlapResult};
use crate::plan::StitchPlan;

/// Everything produced by one stitch.
#[derive(Debug, Clone)]
pub struct StitchOutput {
    pub image: Frame,
    pub plan: StitchPlan,
    pub overlaps: Vec<OverlapResult>,
}

/// Serializable summary of a stitch, without pixels.
#[derive(Debug, Clone, Serialize)]
pub struct StitchSummary {
    pub frame_count: usize,
    pub output_width: u32,
    pub output_height: u32,
    pub skipped_frames: usize,
    pub overlaps: Vec<OverlapResult>,
    pub plan: StitchPlan,
}

impl StitchOutput {
    pub fn summary(&self) -> StitchSummary {
        StitchSummary {
            frame_count: self.plan.entries.len(),
            output_width: self.image.width,
            output_height: self.image.height,
            skipped_frames: self.plan.skipped_frames(),
            overlaps: self.overlaps.clone(),
            plan: self.plan.clone(),
        }
    }
}

/// Compute the overlap of every adjacent pair, in capture order.
pub fn find_overlaps(frames: &[Frame], config: &OverlapConfig) -> StitchResult<Vec<OverlapResult>> {
    let finder = OverlapFinder::new(*config);
    frames
        .windows(2)
        .map(|pair| finder.find_overlap(&pair[0], &pair[1]))
        .collect()
}

/// Plan a stitch without rendering it.
pub fn plan_frames(
    frames: &[Frame],
    config: &OverlapConfig,
) -> StitchResult<(StitchPlan, Vec<OverlapResult>)> {
    if frames.is_empty() {
        return Err(StitchError::NoFrames);
    }
    config.validate()?;
    let overlaps = find_overlaps(frames, config)?;
    let plan = StitchPlan::from_overlaps(frames, &overlaps)?;
    Ok((plan, overlaps))
}

/// Find overlaps, plan, and render in one pass.
pub fn stitch_frames(frames: &[Frame], config: &OverlapConfig) -> StitchResult<StitchOutput> {
    let (plan, overlaps) = plan_frames(frames, config)?;
    let image = match frames {
        [only] => only.clone(),
        _ => Compositor::new().render(frames, &plan)?,
    };
    info!(
        frames = frames.len(),
        skipped = plan.skipped_frames(),
        height = image.height,
        "stitch complete"
    );
    Ok(StitchOutput {
        image,
        plan,
        overlaps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn striped(height: u32, offset: u32) -> Frame {
        let width = 48;
        let mut data = Vec::new();
        for y in 0..height {
            let band = (y + offset) / 6;
            for x in 0..width {
                let mut h = u64::from(band) << 32 | u64::from(x);
                h = (h ^ (h >> 33)).wrapping_mul(0xFF51_AFD7_ED55_8CCD);
                h = (h ^ (h >> 33)).wrapping_mul(0xC4CE_B9FE_1A85_EC53);
                h ^= h >> 33;
                data.extend_from_slice(&[h as u8, (h >> 8) as u8, (h >> 16) as u8, 255]);
            }
        }
        Frame::packed(width, height, PixelFormat::Rgba8, data).unwrap()
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let err = stitch_frames(&[], &OverlapConfig::default()).unwrap_err();
        assert_eq!(err, StitchError::NoFrames);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = OverlapConfig {
            row_step: 0,
            ..OverlapConfig::default()
        };
        let err = stitch_frames(&[striped(40, 0)], &config).unwrap_err();
        assert_eq!(err.category(), "invalid_config");
    }

    #[test]
    fn test_output_height_matches_plan() {
        let frames: Vec<Frame> = (0..3)
            .map(|i| striped(300, i * 60).with_index(i as usize))
            .collect();
        let output = stitch_frames(&frames, &OverlapConfig::default()).unwrap();
        let total: u32 = frames.iter().map(|f| f.height).sum();
        let shared: u32 = output.overlaps.iter().map(|o| o.overlap_rows).sum();
        assert_eq!(output.image.height, total - shared);
        assert_eq!(output.summary().output_height, output.plan.output_height());
    }

    #[test]
    fn test_renders_the_plan_it_reports() {
        let frames: Vec<Frame> = (0..3)
            .map(|i| striped(240, i * 30).with_index(i as usize))
            .collect();
        let output = stitch_frames(&frames, &OverlapConfig::default()).unwrap();
        let direct = Compositor::new().stitch(&frames, &output.overlaps).unwrap();
        assert_eq!(output.image.bytes(), direct.bytes());
        assert_eq!(output.image.height, output.plan.output_height());
    }

    #[test]
    fn test_single_frame_passes_through() {
        let only = striped(37, 5);
        let output = stitch_frames(std::slice::from_ref(&only), &OverlapConfig::default()).unwrap();
        assert_eq!(output.image, only);
        assert!(output.overlaps.is_empty());
        assert_eq!(output.plan.entries.len(), 1);
    }
}

// SPDX-License-Identifier: MIT
//! # Stitch Errors
//!
//! Typed failures raised by the pixel engine. Heuristic outcomes (a weak match,
//! a low similarity score) are never errors; only geometry and input contract
//! violations end up here.

use std::{error::Error as StdError, fmt};

use crate::frame::PixelFormat;

/// Failures raised while validating frames, planning or compositing.
#[derive(Debug, Clone, PartialEq)]
pub enum StitchError {
    /// `stitch()` or a plan was asked to work on an empty frame list.
    NoFrames,
    /// Two frames that must share a width do not.
    DimensionMismatch {
        expected_width: u32,
        found_width: u32,
        frame_index: usize,
    },
    /// Two frames that must share a pixel layout do not.
    PixelFormatMismatch {
        expected: PixelFormat,
        found: PixelFormat,
        frame_index: usize,
    },
    /// A pixel buffer is too small for its declared geometry.
    InvalidBuffer { reason: String },
    /// `overlaps.len()` is not `frames.len() - 1`.
    OverlapCountMismatch { frames: usize, overlaps: usize },
    /// An overlap is larger than one of the two frames it joins.
    OverlapOutOfRange {
        top_index: usize,
        bottom_index: usize,
        overlap_rows: u32,
        reason: String,
    },
    /// A plan was rendered against a different number of frames than it describes.
    PlanMismatch { plan_frames: usize, frames: usize },
    /// The plan would produce an image with no rows.
    EmptyOutput,
    /// A tuning parameter is outside its valid range.
    InvalidConfig { field: String, reason: String },
}

impl StitchError {
    /// Create an invalid buffer error
    pub fn invalid_buffer(reason: impl Into<String>) -> Self {
        Self::InvalidBuffer {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NoFrames => "no_frames",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::PixelFormatMismatch { .. } => "pixel_format_mismatch",
            Self::InvalidBuffer { .. } => "invalid_buffer",
            Self::OverlapCountMismatch { .. } => "overlap_count_mismatch",
            Self::OverlapOutOfRange { .. } => "overlap_out_of_range",
            Self::PlanMismatch { .. } => "plan_mismatch",
            Self::EmptyOutput => "empty_output",
            Self::InvalidConfig { .. } => "invalid_config",
        }
    }
}

impl fmt::Display for StitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StitchError::NoFrames => write!(f, "No frames to stitch"),
            StitchError::DimensionMismatch {
                expected_width,
                found_width,
                frame_index,
            } => write!(
                f,
                "Frame {} has width {} but the session width is {}",
                frame_index, found_width, expected_width
            ),
            StitchError::PixelFormatMismatch {
                expected,
                found,
                frame_index,
            } => write!(
                f,
                "Frame {} uses {:?} but the session format is {:?}",
                frame_index, found, expected
            ),
            StitchError::InvalidBuffer { reason } => write!(f, "Invalid pixel buffer: {}", reason),
            StitchError::OverlapCountMismatch { frames, overlaps } => write!(
                f,
                "Expected {} overlaps for {} frames, got {}",
                frames.saturating_sub(1),
                frames,
                overlaps
            ),
            StitchError::OverlapOutOfRange {
                top_index,
                bottom_index,
                overlap_rows,
                reason,
            } => write!(
                f,
                "Overlap of {} rows between frames {} and {} is invalid: {}",
                overlap_rows, top_index, bottom_index, reason
            ),
            StitchError::PlanMismatch {
                plan_frames,
                frames,
            } => write!(
                f,
                "Stitch plan describes {} frames but {} were supplied",
                plan_frames, frames
            ),
            StitchError::EmptyOutput => write!(f, "Stitch plan produces an empty image"),
            StitchError::InvalidConfig { field, reason } => {
                write!(f, "Invalid stitch configuration '{}': {}", field, reason)
            }
        }
    }
}

impl StdError for StitchError {}

/// Result type alias for the pixel engine
pub type StitchResult<T> = Result<T, StitchError>;

// SPDX-License-Identifier: MIT
//! # Overlap Detection
//!
//! Finds how many rows the bottom of one capture shares with the top of the
//! next. An exhaustive full-resolution comparison at every candidate overlap
//! costs `O(range × width × height)`, so the search works coarse-to-fine:
//!
//! 1. **Duplicate pre-check**: a sparse grid over the shared band, compared at
//!    identical positions. A near-total match means the page did not scroll.
//! 2. **Coarse search**: every `coarse_step`-th overlap from the largest
//!    plausible value down to `min_overlap`, sampling every `row_step`-th row
//!    and `column_step`-th column.
//! 3. **Refinement**: every overlap within `refine_radius` of the coarse winner.
//! 4. **Post-filters**: near-full overlaps and suspicious small overlaps are
//!    reported as duplicates (see [`SmallOverlapPolicy`]).
//!
//! [`SmallOverlapPolicy`]: crate::config::SmallOverlapPolicy

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OverlapConfig;
use crate::error::{StitchError, StitchResult};
use crate::frame::{pixels_match, Frame};

/// How an overlap value was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapKind {
    /// The bottom frame adds nothing new; its overlap covers the shorter frame.
    Duplicate,
    /// A candidate beat the match threshold.
    Matched,
    /// Nothing beat the threshold; the frames are joined without overlap.
    NoMatch,
}

/// Vertical overlap between two adjacent frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapResult {
    pub top_index: usize,
    pub bottom_index: usize,
    /// Rows shared by the bottom of `top` and the top of `bottom`.
    pub overlap_rows: u32,
    /// Fraction of sampled pixels that matched for the reported overlap.
    pub similarity: f64,
    pub kind: OverlapKind,
}

impl OverlapResult {
    pub fn is_duplicate(&self) -> bool {
        self.kind == OverlapKind::Duplicate
    }
}

/// One evaluated overlap value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub overlap: u32,
    pub similarity: f64,
}

/// Result of the coarse search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoarseOutcome {
    /// Highest-similarity candidate above the match threshold, if any.
    pub best: Option<Candidate>,
    /// Highest similarity seen across all candidates.
    pub peak_similarity: f64,
}

/// Coarse-to-fine overlap search with injected tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapFinder {
    config: OverlapConfig,
}

impl OverlapFinder {
    pub fn new(config: OverlapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OverlapConfig {
        &self.config
    }

    /// Compute the overlap between `top` and the frame captured after it.
    ///
    /// Pure and deterministic. Never fails on a poor match; a weak result is
    /// returned with its similarity for the caller to judge.
    ///
    /// # Errors
    /// [`StitchError::DimensionMismatch`] if widths differ,
    /// [`StitchError::PixelFormatMismatch`] if channel orders differ.
    pub fn find_overlap(&self, top: &Frame, bottom: &Frame) -> StitchResult<OverlapResult> {
        check_compatible(top, bottom)?;
        let cfg = &self.config;
        let shared = top.height.min(bottom.height);
        let result = |overlap_rows, similarity, kind| OverlapResult {
            top_index: top.index,
            bottom_index: bottom.index,
            overlap_rows,
            similarity,
            kind,
        };

        let dup = duplicate_fraction(top, bottom, cfg);
        if dup > cfg.duplicate_fraction {
            debug!(
                top = top.index,
                bottom = bottom.index,
                fraction = dup,
                "duplicate pre-check matched"
            );
            return Ok(result(shared, dup, OverlapKind::Duplicate));
        }

        let coarse = coarse_search(top, bottom, cfg);
        let Some(best) = coarse.best else {
            debug!(
                top = top.index,
                bottom = bottom.index,
                peak = coarse.peak_similarity,
                "no candidate above match threshold"
            );
            return Ok(result(0, coarse.peak_similarity, OverlapKind::NoMatch));
        };

        let refined = refine(top, bottom, best, cfg);
        debug!(
            top = top.index,
            bottom = bottom.index,
            coarse = best.overlap,
            refined = refined.overlap,
            similarity = refined.similarity,
            "overlap refined"
        );

        let near_full = f64::from(refined.overlap) >= cfg.full_duplicate_fraction * f64::from(shared);
        if near_full && refined.similarity > cfg.full_duplicate_similarity {
            debug!(top = top.index, bottom = bottom.index, "near-full overlap treated as duplicate");
            return Ok(result(shared, refined.similarity, OverlapKind::Duplicate));
        }
        if cfg
            .small_overlap
            .forces_duplicate(refined.overlap, refined.similarity)
        {
            debug!(
                top = top.index,
                bottom = bottom.index,
                overlap = refined.overlap,
                "small high-similarity overlap treated as duplicate"
            );
            return Ok(result(shared, refined.similarity, OverlapKind::Duplicate));
        }

        Ok(result(refined.overlap, refined.similarity, OverlapKind::Matched))
    }
}

/// Overlap between two frames using the default tuning.
pub fn overlap(top: &Frame, bottom: &Frame) -> StitchResult<OverlapResult> {
    OverlapFinder::default().find_overlap(top, bottom)
}

fn check_compatible(top: &Frame, bottom: &Frame) -> StitchResult<()> {
    if top.width != bottom.width {
        return Err(StitchError::DimensionMismatch {
            expected_width: top.width,
            found_width: bottom.width,
            frame_index: bottom.index,
        });
    }
    if top.format != bottom.format {
        return Err(StitchError::PixelFormatMismatch {
            expected: top.format,
            found: bottom.format,
            frame_index: bottom.index,
        });
    }
    Ok(())
}

/// Fraction of grid samples that match at identical positions in both frames,
/// over the band both frames cover.
pub fn duplicate_fraction(top: &Frame, bottom: &Frame, cfg: &OverlapConfig) -> f64 {
    let shared = top.height.min(bottom.height);
    let step = cfg.duplicate_grid_step.max(1) as usize;
    let mut samples = 0usize;
    let mut matches = 0usize;
    for y in (0..shared).step_by(step) {
        let (a, b) = (top.row(y), bottom.row(y));
        for x in (0..top.width as usize).step_by(step) {
            let i = x * 4;
            samples += 1;
            if pixels_match(&a[i..i + 4], &b[i..i + 4], cfg.tolerance) {
                matches += 1;
            }
        }
    }
    ratio(matches, samples)
}

/// Similarity of the last `overlap` rows of `top` against the first `overlap`
/// rows of `bottom`, sampled at the configured row and column steps.
pub fn band_similarity(top: &Frame, bottom: &Frame, overlap: u32, cfg: &OverlapConfig) -> f64 {
    if overlap == 0 || overlap > top.height.min(bottom.height) {
        return 0.0;
    }
    let top_start = top.height - overlap;
    let col_step = cfg.column_step.max(1) as usize;
    let mut samples = 0usize;
    let mut matches = 0usize;
    for r in (0..overlap).step_by(cfg.row_step.max(1) as usize) {
        let (a, b) = (top.row(top_start + r), bottom.row(r));
        for x in (0..top.width as usize).step_by(col_step) {
            let i = x * 4;
            samples += 1;
            if pixels_match(&a[i..i + 4], &b[i..i + 4], cfg.tolerance) {
                matches += 1;
            }
        }
    }
    ratio(matches, samples)
}

/// Largest overlap the coarse search considers.
pub fn max_search_range(top: &Frame, bottom: &Frame, cfg: &OverlapConfig) -> u32 {
    let shared = top.height.min(bottom.height);
    (cfg.search_fraction * f64::from(shared)).floor() as u32
}

/// Scan candidate overlaps from the largest plausible value downward.
///
/// A candidate replaces the current best only when it beats both the match
/// threshold and the best similarity so far, so ties keep the larger overlap.
pub fn coarse_search(top: &Frame, bottom: &Frame, cfg: &OverlapConfig) -> CoarseOutcome {
    let mut outcome = CoarseOutcome {
        best: None,
        peak_similarity: 0.0,
    };
    let step = cfg.coarse_step.max(1);
    let mut overlap = max_search_range(top, bottom, cfg);
    while overlap >= cfg.min_overlap && overlap > 0 {
        let similarity = band_similarity(top, bottom, overlap, cfg);
        if similarity > outcome.peak_similarity {
            outcome.peak_similarity = similarity;
        }
        let beats_best = outcome.best.map_or(true, |b| similarity > b.similarity);
        if similarity > cfg.match_threshold && beats_best {
            outcome.best = Some(Candidate {
                overlap,
                similarity,
            });
        }
        match overlap.checked_sub(step) {
            Some(next) => overlap = next,
            None => break,
        }
    }
    outcome
}

/// Re-evaluate every overlap within `refine_radius` of `coarse`, keeping the
/// highest similarity. The coarse winner is part of the window, so the result
/// is never worse than the input.
pub fn refine(top: &Frame, bottom: &Frame, coarse: Candidate, cfg: &OverlapConfig) -> Candidate {
    let shared = top.height.min(bottom.height);
    let lo = coarse
        .overlap
        .saturating_sub(cfg.refine_radius)
        .max(cfg.min_overlap);
    let hi = coarse.overlap.saturating_add(cfg.refine_radius).min(shared);
    let mut best = coarse;
    for overlap in lo..=hi {
        if overlap == coarse.overlap {
            continue;
        }
        let similarity = band_similarity(top, bottom, overlap, cfg);
        if similarity > best.similarity {
            best = Candidate {
                overlap,
                similarity,
            };
        }
    }
    best
}

fn ratio(matches: usize, samples: usize) -> f64 {
    if samples == 0 {
        0.0
    } else {
        matches as f64 / samples as f64
    }
}

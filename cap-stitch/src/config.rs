// SPDX-License-Identifier: MIT
//! # Overlap Search Tuning
//!
//! Every heuristic constant used by [`crate::overlap::OverlapFinder`] lives in
//! [`OverlapConfig`], so fixtures can run the finder with tighter or looser
//! tolerances than the capture defaults.
//!
//! | Parameter | Default | Role |
//! |-----------|---------|------|
//! | `tolerance` | 25 | Per-channel match tolerance |
//! | `duplicate_grid_step` | 8 | Row/column step of the duplicate pre-check |
//! | `duplicate_fraction` | 0.90 | Pre-check match fraction that means "same frame" |
//! | `min_overlap` | 10 | Smallest overlap the coarse search tries |
//! | `coarse_step` | 5 | Candidate step of the coarse search |
//! | `search_fraction` | 0.9 | Largest candidate as a fraction of the shorter frame |
//! | `row_step` / `column_step` | 2 / 4 | Band sampling density |
//! | `match_threshold` | 0.65 | Similarity a candidate must beat to count |
//! | `refine_radius` | 4 | Half-width of the refinement window |
//! | `full_duplicate_fraction` / `full_duplicate_similarity` | 0.9 / 0.70 | Near-full overlap treated as duplicate |

use serde::{Deserialize, Serialize};

use crate::error::{StitchError, StitchResult};

/// What to do with a small overlap that matches almost perfectly.
///
/// A strong match on a tiny band usually means the page did not move and
/// only a thin strip (a blinking caret, a clock) changed. It can also be a
/// genuine fast, short scroll; the default favours the former.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SmallOverlapPolicy {
    /// Treat overlaps below `max_overlap` rows with similarity above
    /// `min_similarity` as a full duplicate of the previous frame.
    ForceDuplicate { max_overlap: u32, min_similarity: f64 },
    /// Report small overlaps as found.
    Keep,
}

impl Default for SmallOverlapPolicy {
    fn default() -> Self {
        Self::ForceDuplicate {
            max_overlap: 200,
            min_similarity: 0.90,
        }
    }
}

impl SmallOverlapPolicy {
    /// Whether a found `(overlap, similarity)` should be overridden as a duplicate.
    pub fn forces_duplicate(&self, overlap: u32, similarity: f64) -> bool {
        match *self {
            Self::ForceDuplicate {
                max_overlap,
                min_similarity,
            } => overlap > 0 && overlap < max_overlap && similarity > min_similarity,
            Self::Keep => false,
        }
    }
}

/// Tuning for the coarse-to-fine overlap search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapConfig {
    pub tolerance: u8,
    pub duplicate_grid_step: u32,
    pub duplicate_fraction: f64,
    pub min_overlap: u32,
    pub coarse_step: u32,
    pub search_fraction: f64,
    pub row_step: u32,
    pub column_step: u32,
    pub match_threshold: f64,
    pub refine_radius: u32,
    pub full_duplicate_fraction: f64,
    pub full_duplicate_similarity: f64,
    pub small_overlap: SmallOverlapPolicy,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            tolerance: 25,
            duplicate_grid_step: 8,
            duplicate_fraction: 0.90,
            min_overlap: 10,
            coarse_step: 5,
            search_fraction: 0.9,
            row_step: 2,
            column_step: 4,
            match_threshold: 0.65,
            refine_radius: 4,
            full_duplicate_fraction: 0.9,
            full_duplicate_similarity: 0.70,
            small_overlap: SmallOverlapPolicy::default(),
        }
    }
}

impl OverlapConfig {
    /// Same tuning with a different small-overlap policy.
    pub fn with_small_overlap(mut self, policy: SmallOverlapPolicy) -> Self {
        self.small_overlap = policy;
        self
    }

    /// Reject zero steps and fractions outside `[0, 1]`.
    pub fn validate(&self) -> StitchResult<()> {
        let steps = [
            ("duplicate_grid_step", self.duplicate_grid_step),
            ("coarse_step", self.coarse_step),
            ("row_step", self.row_step),
            ("column_step", self.column_step),
            ("min_overlap", self.min_overlap),
        ];
        for (field, value) in steps {
            if value == 0 {
                return Err(StitchError::invalid_config(field, "must be greater than 0"));
            }
        }

        let fractions = [
            ("duplicate_fraction", self.duplicate_fraction),
            ("search_fraction", self.search_fraction),
            ("match_threshold", self.match_threshold),
            ("full_duplicate_fraction", self.full_duplicate_fraction),
            ("full_duplicate_similarity", self.full_duplicate_similarity),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(StitchError::invalid_config(
                    field,
                    format!("must be between 0 and 1, got {}", value),
                ));
            }
        }

        if let SmallOverlapPolicy::ForceDuplicate { min_similarity, .. } = self.small_overlap {
            if !(0.0..=1.0).contains(&min_similarity) {
                return Err(StitchError::invalid_config(
                    "small_overlap.min_similarity",
                    format!("must be between 0 and 1, got {}", min_similarity),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(OverlapConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_step_rejected() {
        let config = OverlapConfig {
            coarse_step: 0,
            ..OverlapConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("coarse_step"));
    }

    #[test]
    fn test_fraction_out_of_range_rejected() {
        let config = OverlapConfig {
            match_threshold: 1.5,
            ..OverlapConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_small_overlap_policy() {
        let policy = SmallOverlapPolicy::default();
        assert!(policy.forces_duplicate(150, 0.95));
        assert!(!policy.forces_duplicate(150, 0.80));
        assert!(!policy.forces_duplicate(250, 0.99));
        assert!(!policy.forces_duplicate(0, 0.99));
        assert!(!SmallOverlapPolicy::Keep.forces_duplicate(150, 0.99));
    }
}

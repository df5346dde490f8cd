//! # Configuration Module
//!
//! All tuning for a scroll capture lives in one [`StitchConfig`] value, which
//! is injected into the detector and the overlap finder. Nothing reads global
//! state, so tests can run sessions with tighter or looser thresholds side by
//! side.
//!
//! ## Detector Parameters
//!
//! | Parameter | Type | Default | Description |
//! |-----------|------|---------|-------------|
//! | `poll_interval_ms` | `u64` | 100 | Time between probe captures |
//! | `cooldown_ms` | `u64` | 200 | Minimum time between two "new frame" signals |
//! | `change_threshold` | `f64` | 0.03 | Fraction of sampled pixels that must differ |
//! | `pixel_tolerance` | `u8` | 10 | Per-channel difference still counted as equal |
//! | `sample_step` | `usize` | 10 | Distance between sampled pixel positions |
//!
//! Overlap parameters are documented on [`cap_stitch::OverlapConfig`].
//!
//! ## Loading
//!
//! Configuration files are JSON. Every field is optional; missing fields keep
//! their defaults.
//!
//! ```rust
//! use scroll_capture::config::StitchConfig;
//!
//! let config: StitchConfig =
//!     serde_json::from_str(r#"{ "detector": { "cooldown_ms": 350 } }"#).unwrap();
//! assert_eq!(config.detector.cooldown_ms, 350);
//! assert_eq!(config.detector.poll_interval_ms, 100);
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;
use std::time::Duration;

use cap_stitch::OverlapConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, CaptureResult};

/// Timing and sensitivity of the scroll detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Time between probe captures, in milliseconds. Must be greater than 0.
    pub poll_interval_ms: u64,

    /// Minimum time between two signals, in milliseconds.
    pub cooldown_ms: u64,

    /// A probe counts as changed when more than this fraction of sampled
    /// positions differ from the reference frame. Must be in `[0, 1)`.
    pub change_threshold: f64,

    /// Largest per-channel difference still treated as "same pixel".
    pub pixel_tolerance: u8,

    /// Sample every `sample_step`-th pixel of the buffer. Must be greater than 0.
    pub sample_step: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            cooldown_ms: 200,
            change_threshold: 0.03,
            pixel_tolerance: 10,
            sample_step: 10,
        }
    }
}

impl DetectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Validates the detector parameters.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(CaptureError::config(
                "detector.poll_interval_ms",
                "0",
                "must be greater than 0",
            ));
        }
        if !(0.0..1.0).contains(&self.change_threshold) {
            return Err(CaptureError::config(
                "detector.change_threshold",
                self.change_threshold.to_string(),
                "must be in [0, 1)",
            ));
        }
        if self.sample_step == 0 {
            return Err(CaptureError::config(
                "detector.sample_step",
                "0",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Complete tuning for one scroll capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    pub detector: DetectorConfig,
    pub overlap: OverlapConfig,
}

impl StitchConfig {
    /// Validates both halves of the configuration.
    pub fn validate(&self) -> CaptureResult<()> {
        self.detector.validate()?;
        self.overlap.validate().map_err(|e| {
            CaptureError::from(e).with_recovery_suggestion("Check the \"overlap\" section")
        })
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::io_at("read config", path, e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| CaptureError::from(e).with_context(path.display().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON, suitable as a starting point for a config file.
    pub fn to_json_pretty(&self) -> CaptureResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

//! # Scroll Detector
//!
//! Decides when the watched region has changed enough to be worth a new
//! frame. Each tick captures a probe and compares a fixed stride of pixel
//! positions against the reference frame; when more than
//! `change_threshold` of them differ and the cooldown has elapsed, the probe
//! becomes the new reference and is handed to the session as a signal.
//!
//! The reference frame is an ordinary field of one [`ScrollDetector`], created
//! when monitoring starts and cleared by [`ScrollDetector::stop`].
//!
//! ```text
//!   tick ──▶ probe ──▶ ratio > threshold? ──no──▶ discard probe
//!                            │yes
//!                      cooldown elapsed? ──no──▶ discard probe
//!                            │yes
//!                   reference = probe, signal(probe)
//! ```

use cap_stitch::Frame;
use cap_stitch::frame::pixels_match;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::capture::{CaptureRegion, CaptureSource};
use crate::config::DetectorConfig;
use crate::error::classify;

/// Outcome of comparing one probe against the reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// The probe differs enough and the cooldown has elapsed; it is now the reference.
    Changed,
    /// The probe differs enough but the previous signal was too recent.
    CoolingDown,
    /// The probe is close enough to the reference to be ignored.
    Unchanged,
}

/// Fraction of sampled pixel positions whose colour differs by more than
/// `pixel_tolerance` on any channel.
///
/// Frames with different dimensions count as entirely changed.
pub fn difference_ratio(reference: &Frame, probe: &Frame, config: &DetectorConfig) -> f64 {
    if reference.width != probe.width || reference.height != probe.height {
        return 1.0;
    }
    let width = reference.width as usize;
    let total = width * reference.height as usize;

    let mut sampled = 0usize;
    let mut changed = 0usize;
    for position in (0..total).step_by(config.sample_step.max(1)) {
        let x = (position % width) as u32;
        let y = (position / width) as u32;
        sampled += 1;
        if !pixels_match(
            reference.pixel(x, y),
            probe.pixel(x, y),
            config.pixel_tolerance,
        ) {
            changed += 1;
        }
    }
    changed as f64 / sampled as f64
}

/// Change detector for one monitoring session.
#[derive(Debug)]
pub struct ScrollDetector {
    config: DetectorConfig,
    reference: Option<Frame>,
    last_signal: Option<Instant>,
}

impl ScrollDetector {
    /// Start monitoring with `reference` as the comparison baseline.
    pub fn new(config: DetectorConfig, reference: Frame) -> Self {
        Self {
            config,
            reference: Some(reference),
            last_signal: None,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// Clear the reference frame. A probe evaluated afterwards becomes the
    /// new baseline without signalling.
    pub fn stop(&mut self) {
        self.reference = None;
        self.last_signal = None;
    }

    /// Compare `probe` against the reference at time `now`.
    ///
    /// Only [`Detection::Changed`] mutates the detector.
    pub fn evaluate(&mut self, probe: &Frame, now: Instant) -> Detection {
        let Some(reference) = &self.reference else {
            self.reference = Some(probe.clone());
            return Detection::Unchanged;
        };

        let ratio = difference_ratio(reference, probe, &self.config);
        if ratio <= self.config.change_threshold {
            trace!(ratio, "probe unchanged");
            return Detection::Unchanged;
        }

        let cooled = self
            .last_signal
            .is_none_or(|at| now.duration_since(at) >= self.config.cooldown());
        if !cooled {
            trace!(ratio, "probe changed during cooldown");
            return Detection::CoolingDown;
        }

        debug!(ratio, "scroll detected");
        self.reference = Some(probe.clone());
        self.last_signal = Some(now);
        Detection::Changed
    }

    /// Poll `source` every `poll_interval` and send each signalling probe to
    /// `signals`.
    ///
    /// Ticks run one after another in this task, so at most one probe is ever
    /// outstanding; a slow capture delays the next tick rather than
    /// overlapping it. A failed probe is logged and the tick skipped. Returns
    /// once the receiving side of `signals` is closed.
    pub async fn run<S>(
        &mut self,
        source: &mut S,
        region: &CaptureRegion,
        signals: mpsc::Sender<Frame>,
    ) where
        S: CaptureSource + ?Sized,
    {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the baseline was just captured.
        ticker.tick().await;

        while !signals.is_closed() {
            ticker.tick().await;
            let probe = match source.capture(region).await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(
                        source = source.name(),
                        error = %e,
                        transient = classify::is_transient(&e),
                        "probe capture failed, skipping tick"
                    );
                    continue;
                }
            };

            if self.evaluate(&probe, Instant::now()) == Detection::Changed
                && signals.send(probe).await.is_err()
            {
                break;
            }
        }
        debug!("monitoring stopped");
    }
}

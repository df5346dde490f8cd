//! # Scroll Capture Library
//!
//! Turns a window that the user scrolls into one tall screenshot. While a
//! session is running, the scroll detector watches the selected region and
//! grabs a new frame each time the content moves; when the user is done, the
//! frames are stitched into a single image with no duplicated or missing rows.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `capture`: the capture-source seam, live display capture and image replay
//! - `detector`: decides when the watched region changed enough for a new frame
//! - `session`: state machine that drives detector, frame list and stitching
//! - `replay`: offline loading, auditing and saving of frame sequences
//! - `config`: detector and overlap tuning, loaded from JSON
//! - `logging`: `tracing` subscriber setup for binaries
//!
//! The pixel work (overlap search, planning, compositing) lives in the
//! runtime-free `cap_stitch` crate and is re-exported here.
//!
//! ## Example
//!
//! ```rust,no_run
//! use scroll_capture::{stitch_directory, StitchConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let output = stitch_directory("frames/", &StitchConfig::default()).await?;
//! scroll_capture::replay::save_png(&output.image, "page.png")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

pub mod capture;
pub mod config;
pub mod detector;
pub mod error;
pub mod logging;
pub mod replay;
pub mod session;

pub use capture::{CaptureRegion, CaptureSource, ImageSequenceSource};
#[cfg(feature = "screen-capture")]
pub use capture::ScrapCaptureSource;
pub use config::{DetectorConfig, StitchConfig};
pub use detector::{Detection, ScrollDetector, difference_ratio};
/// Re-export error types for convenience
pub use error::{CaptureError, CaptureResult, HasRecoverySuggestion, HasSeverity, Retryable};
pub use session::{
    CancelSignal, FinishSignal, ScrollCapture, SessionController, SessionEvent, SessionEvents,
    SessionOutcome, SessionState, StitchedCapture,
};

/// Re-export the pixel engine
pub use cap_stitch::{
    Frame, OverlapConfig, OverlapKind, OverlapResult, PixelFormat, SmallOverlapPolicy,
    StitchError, StitchOutput, StitchPlan, overlap, stitch_frames,
};

/// Load every image in `dir` (lexical order) and stitch them.
///
/// Decoding and stitching run on a blocking worker so large sequences do not
/// stall the runtime.
pub async fn stitch_directory(
    dir: impl AsRef<Path>,
    config: &StitchConfig,
) -> CaptureResult<StitchOutput> {
    config.validate()?;
    let dir = dir.as_ref().to_path_buf();
    let tuning = config.overlap;
    tokio::task::spawn_blocking(move || -> CaptureResult<StitchOutput> {
        let frames = replay::load_frames(&dir)?;
        Ok(stitch_frames(&frames, &tuning)?)
    })
    .await
    .map_err(|e| CaptureError::external("tokio", e).with_operation("stitch_directory"))?
}

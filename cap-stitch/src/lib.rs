// SPDX-License-Identifier: MIT
//! # cap-stitch: Overlap Detection and Compositing for Scrolling Captures
//!
//! This crate turns an ordered run of overlapping screen captures, taken while
//! a window scrolls, into one image with no duplicated or missing rows.
//!
//! ## Architecture Overview
//!
//! Everything here is pure and synchronous: no runtime, no shared mutable
//! state. Capture sessions run it on a worker thread over an immutable
//! snapshot of their frames; offline tooling runs it directly.
//!
//! ## Key Components
//!
//! - [`frame`]: immutable, stride-aware 4-byte-per-pixel captures
//! - [`sequence`]: the append-only frame list a session accumulates
//! - [`config`]: every overlap heuristic constant, injectable
//! - [`overlap`]: coarse-to-fine vertical overlap search
//! - [`plan`]: per-frame row ranges and output geometry
//! - [`compositor`]: renders a plan into one owned buffer
//! - [`pipeline`]: overlaps + plan + render in one call
//!
//! ## Usage Example
//!
//! ```rust
//! use cap_stitch::{overlap, stitch_frames, Frame, OverlapConfig, PixelFormat};
//!
//! let page = vec![200u8; 64 * 48 * 4];
//! let a = Frame::packed(64, 48, PixelFormat::Bgra8, page.clone())?;
//! let b = Frame::packed(64, 48, PixelFormat::Bgra8, page)?.with_index(1);
//!
//! // Identical captures: the second adds nothing.
//! assert_eq!(overlap(&a, &b)?.overlap_rows, 48);
//!
//! let output = stitch_frames(&[a, b], &OverlapConfig::default())?;
//! assert_eq!(output.image.height, 48);
//! # Ok::<(), cap_stitch::StitchError>(())
//! ```

pub mod compositor;
pub mod config;
pub mod error;
pub mod frame;
pub mod overlap;
pub mod pipeline;
pub mod plan;
pub mod sequence;

pub use compositor::Compositor;
pub use config::{OverlapConfig, SmallOverlapPolicy};
pub use error::{StitchError, StitchResult};
pub use frame::{Frame, PixelFormat};
pub use overlap::{overlap, OverlapFinder, OverlapKind, OverlapResult};
pub use pipeline::{find_overlaps, plan_frames, stitch_frames, StitchOutput, StitchSummary};
pub use plan::{PlanEntry, StitchPlan};
pub use sequence::FrameSequence;

//! # Offline Replay
//!
//! Reproduces and audits a stitch from a directory of ordered still images.
//! Lexical filename order is capture order, so `frame_000.png`,
//! `frame_001.png`, ... replay exactly as they were captured. This is the
//! main debugging and regression-fixture path: a failing capture can be saved
//! frame by frame and re-run here with different tuning.

use std::fmt;
use std::path::{Path, PathBuf};

use cap_stitch::{
    plan_frames, Frame, OverlapConfig, OverlapResult, PixelFormat, StitchError, StitchPlan,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CaptureError, CaptureResult};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Image files in `dir`, sorted by file name.
pub fn list_frame_files(dir: impl AsRef<Path>) -> CaptureResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries =
        std::fs::read_dir(dir).map_err(|e| CaptureError::io_at("read frame directory", dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| CaptureError::io_at("read frame directory", dir, e))?
            .path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Decode one image file into an RGBA frame.
pub fn load_frame(path: impl AsRef<Path>) -> CaptureResult<Frame> {
    let path = path.as_ref();
    let image = image::open(path)
        .map_err(|e| CaptureError::from(e).with_context(path.display().to_string()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(Frame::packed(width, height, PixelFormat::Rgba8, image.into_raw())?)
}

/// Load every image in `dir` in lexical order, numbered from 0.
///
/// # Errors
/// `StitchError::NoFrames` (wrapped) if the directory holds no images.
pub fn load_frames(dir: impl AsRef<Path>) -> CaptureResult<Vec<Frame>> {
    let dir = dir.as_ref();
    let files = list_frame_files(dir)?;
    if files.is_empty() {
        return Err(CaptureError::from(StitchError::NoFrames)
            .with_context(format!("no images in {}", dir.display())));
    }

    let mut frames = Vec::with_capacity(files.len());
    for (index, path) in files.iter().enumerate() {
        let frame = load_frame(path)?.with_index(index);
        debug!(frame = index, path = %path.display(), width = frame.width, height = frame.height, "loaded");
        frames.push(frame);
    }
    info!(frames = frames.len(), dir = %dir.display(), "replay frames loaded");
    Ok(frames)
}

/// Write a frame as PNG, swizzling BGRA to RGBA if needed.
pub fn save_png(frame: &Frame, path: impl AsRef<Path>) -> CaptureResult<()> {
    let path = path.as_ref();
    image::save_buffer_with_format(
        path,
        &frame.to_rgba_vec(),
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .map_err(|e| CaptureError::from(e).with_context(path.display().to_string()))
}

/// Outcome of auditing a replayed sequence, without rendering it.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub width: u32,
    pub frame_heights: Vec<u32>,
    pub overlaps: Vec<OverlapResult>,
    pub plan: StitchPlan,
    pub output_height: u32,
}

impl ReplayReport {
    pub fn to_json(&self) -> CaptureResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Tabular rendering for terminals.
impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} frames, {}px wide -> {} rows",
            self.frame_heights.len(),
            self.width,
            self.output_height
        )?;
        writeln!(f, "{:>5}  {:>6}  {:>8}  {:>10}  {:>9}", "pair", "rows", "overlap", "similarity", "kind")?;
        for o in &self.overlaps {
            writeln!(
                f,
                "{:>2}-{:<2}  {:>6}  {:>8}  {:>10.3}  {:>9}",
                o.top_index,
                o.bottom_index,
                self.frame_heights.get(o.bottom_index).copied().unwrap_or(0),
                o.overlap_rows,
                o.similarity,
                format!("{:?}", o.kind)
            )?;
        }
        write!(f, "kept rows:")?;
        for entry in &self.plan.entries {
            write!(f, " {}", entry.rows())?;
        }
        writeln!(f)
    }
}

/// Compute pairwise overlaps and the stitch plan for `frames`.
pub fn audit(frames: &[Frame], config: &OverlapConfig) -> CaptureResult<ReplayReport> {
    let (plan, overlaps) = plan_frames(frames, config)?;
    Ok(ReplayReport {
        width: plan.width,
        frame_heights: frames.iter().map(|f| f.height).collect(),
        output_height: plan.output_height(),
        overlaps,
        plan,
    })
}

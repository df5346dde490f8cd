//! Replays recorded still images as if they were live captures.
//!
//! Each `capture` call returns the next image, cropped to the requested
//! region. Once the images run out the last one is returned forever, which
//! looks to the detector like a page that stopped scrolling.

use async_trait::async_trait;
use cap_stitch::Frame;
use std::path::Path;

use super::{CaptureRegion, CaptureSource};
use crate::error::{CaptureError, CaptureResult};
use crate::replay;

#[derive(Debug)]
pub struct ImageSequenceSource {
    frames: Vec<Frame>,
    cursor: usize,
}

impl ImageSequenceSource {
    /// Replay frames in the given order.
    pub fn new(frames: Vec<Frame>) -> CaptureResult<Self> {
        if frames.is_empty() {
            return Err(CaptureError::validation(
                "frames",
                "at least one frame is required",
                "0",
            ));
        }
        Ok(Self { frames, cursor: 0 })
    }

    /// Replay every image in `dir` in lexical filename order.
    pub fn from_dir(dir: impl AsRef<Path>) -> CaptureResult<Self> {
        Self::new(replay::load_frames(dir)?)
    }

    /// Number of `capture` calls served so far.
    pub fn served(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.frames.len()
    }
}

#[async_trait]
impl CaptureSource for ImageSequenceSource {
    async fn capture(&mut self, region: &CaptureRegion) -> CaptureResult<Frame> {
        let position = self.cursor.min(self.frames.len() - 1);
        self.cursor += 1;
        region.crop(&self.frames[position])
    }

    fn name(&self) -> &str {
        "image_sequence"
    }
}

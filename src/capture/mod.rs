//! # Capture Module
//!
//! The seam between a scroll capture session and whatever produces pixels.
//! Sessions only ever call [`CaptureSource::capture`]; the platform grabber,
//! a replayed image directory and test doubles all plug in here.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use cap_stitch::Frame;

use crate::error::{CaptureError, CaptureResult};

pub mod image_sequence;
#[cfg(feature = "screen-capture")]
pub mod scrap;

pub use image_sequence::ImageSequenceSource;
#[cfg(feature = "screen-capture")]
pub use scrap::ScrapCaptureSource;

/// Screen rectangle being captured, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    /// Create a region, rejecting empty rectangles.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> CaptureResult<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::validation(
                "region",
                "width and height must be greater than 0",
                format!("{}x{}", width, height),
            ));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Whether the region lies inside a `width` x `height` surface.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }

    /// Cut this region out of a full-surface frame.
    pub fn crop(&self, frame: &Frame) -> CaptureResult<Frame> {
        if !self.fits_within(frame.width, frame.height) {
            return Err(CaptureError::capture_failed(format!(
                "region {} does not fit a {}x{} surface",
                self, frame.width, frame.height
            )));
        }
        if self.x == 0 && self.y == 0 && self.width == frame.width && self.height == frame.height
        {
            return Ok(frame.clone());
        }
        Ok(frame.crop(self.x, self.y, self.width, self.height)?)
    }
}

impl fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `X,Y,W,H`.
impl FromStr for CaptureRegion {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, w, h] = parts.as_slice() else {
            return Err(CaptureError::validation("region", "expected X,Y,W,H", s));
        };
        let number = |v: &str| {
            v.parse::<u32>()
                .map_err(|_| CaptureError::validation("region", "not a non-negative integer", v))
        };
        Self::new(number(x)?, number(y)?, number(w)?, number(h)?)
    }
}

/// Abstract interface for frame capture sources.
///
/// Implementations must return frames exactly `region.width` pixels wide;
/// the session rejects a width change as a hard error.
#[async_trait]
pub trait CaptureSource: Send {
    /// Capture the current contents of `region`.
    async fn capture(&mut self, region: &CaptureRegion) -> CaptureResult<Frame>;

    /// Short name used in log events.
    fn name(&self) -> &str {
        "capture"
    }
}

#[async_trait]
impl<S: CaptureSource + ?Sized> CaptureSource for Box<S> {
    async fn capture(&mut self, region: &CaptureRegion) -> CaptureResult<Frame> {
        (**self).capture(region).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cap_stitch::PixelFormat;

    #[test]
    fn test_region_parsing() {
        let region: CaptureRegion = "10, 20,300,400".parse().unwrap();
        assert_eq!(region, CaptureRegion::new(10, 20, 300, 400).unwrap());
        assert_eq!(region.to_string(), "10,20 300x400");

        assert!("10,20,300".parse::<CaptureRegion>().is_err());
        assert!("10,20,0,400".parse::<CaptureRegion>().is_err());
        assert!("a,20,300,400".parse::<CaptureRegion>().is_err());
    }

    #[test]
    fn test_region_crop() {
        let mut data = Vec::new();
        for y in 0..6u8 {
            for x in 0..8u8 {
                data.extend_from_slice(&[x, y, 0, 255]);
            }
        }
        let screen = Frame::packed(8, 6, PixelFormat::Bgra8, data).unwrap();

        let region = CaptureRegion::new(2, 1, 4, 3).unwrap();
        let cropped = region.crop(&screen).unwrap();
        assert_eq!((cropped.width, cropped.height), (4, 3));
        assert_eq!(cropped.pixel(0, 0), &[2, 1, 0, 255]);

        let too_big = CaptureRegion::new(6, 0, 4, 3).unwrap();
        assert_eq!(too_big.crop(&screen).unwrap_err().category(), "capture_failed");
    }
}

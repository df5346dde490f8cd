//! Common test utilities for the scroll capture integration tests
//!
//! Synthetic "documents" to scroll through, plus scripted capture sources
//! that stand in for the display.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use scroll_capture::{
    CaptureError, CaptureRegion, CaptureResult, CaptureSource, Frame, PixelFormat, SessionEvent,
    SessionEvents,
};
use tokio::time::Instant;

/// Deterministic noise, constant over 8-row bands like lines of text.
pub fn noise(x: u32, band: u32, seed: u64) -> [u8; 4] {
    let mut h = (u64::from(x) << 32 | u64::from(band)) ^ seed;
    h = h.wrapping_add(0x9E37_79B9_7F4A_7C15);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= h >> 31;
    [h as u8, (h >> 8) as u8, (h >> 16) as u8, 255]
}

/// Rows `offset..offset + height` of an endless noise document.
pub fn window(width: u32, height: u32, offset: u32, seed: u64) -> Frame {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&noise(x, (y + offset) / 8, seed));
        }
    }
    Frame::packed(width, height, PixelFormat::Bgra8, data).unwrap()
}

/// The same document captured at each scroll offset, numbered in order.
pub fn scrolled(width: u32, height: u32, offsets: &[u32], seed: u64) -> Vec<Frame> {
    offsets
        .iter()
        .enumerate()
        .map(|(i, &offset)| window(width, height, offset, seed).with_index(i))
        .collect()
}

/// One scripted response of a [`ScriptedSource`].
#[derive(Debug, Clone)]
pub enum Step {
    Frame(Frame),
    Fail,
    /// The display stops answering.
    Stall,
}

/// Answers the n-th capture call with the n-th step; the last step repeats.
///
/// Frames are returned as-is, ignoring the requested region.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    steps: Vec<Step>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        assert!(!steps.is_empty());
        Self {
            steps,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn frames(frames: Vec<Frame>) -> Self {
        Self::new(frames.into_iter().map(Step::Frame).collect())
    }

    /// Shared call counter, readable after the source moved into a session.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CaptureSource for ScriptedSource {
    async fn capture(&mut self, _region: &CaptureRegion) -> CaptureResult<Frame> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.steps[call.min(self.steps.len() - 1)] {
            Step::Frame(frame) => Ok(frame.clone()),
            Step::Stall => std::future::pending().await,
            Step::Fail => Err(CaptureError::capture_failed(format!(
                "scripted failure on call {}",
                call
            ))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Shows `still` until `switch_at`, then `a` once, then `b` for good: the
/// page scrolls twice in quick succession and stays put.
#[derive(Debug)]
pub struct TimedSource {
    pub still: Frame,
    pub a: Frame,
    pub b: Frame,
    pub switch_at: Instant,
    moving_calls: usize,
}

impl TimedSource {
    pub fn new(still: Frame, a: Frame, b: Frame, switch_at: Instant) -> Self {
        Self {
            still,
            a,
            b,
            switch_at,
            moving_calls: 0,
        }
    }
}

#[async_trait]
impl CaptureSource for TimedSource {
    async fn capture(&mut self, _region: &CaptureRegion) -> CaptureResult<Frame> {
        if Instant::now() < self.switch_at {
            return Ok(self.still.clone());
        }
        self.moving_calls += 1;
        Ok(if self.moving_calls == 1 {
            self.a.clone()
        } else {
            self.b.clone()
        })
    }
}

/// A display that never answers.
#[derive(Debug, Default)]
pub struct StalledSource;

#[async_trait]
impl CaptureSource for StalledSource {
    async fn capture(&mut self, _region: &CaptureRegion) -> CaptureResult<Frame> {
        std::future::pending().await
    }
}

pub fn region(width: u32, height: u32) -> CaptureRegion {
    CaptureRegion::new(0, 0, width, height).unwrap()
}

/// Read events until `captured_count` reaches `count`, returning everything seen.
pub async fn wait_for_frames(events: &mut SessionEvents, count: usize) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    let deadline = Duration::from_secs(30);
    loop {
        let event = tokio::time::timeout(deadline, events.next_event())
            .await
            .expect("timed out waiting for frames")
            .expect("event stream ended early");
        let reached = matches!(
            event,
            SessionEvent::FrameCaptured { captured_count } if captured_count >= count
        );
        seen.push(event);
        if reached {
            return seen;
        }
    }
}

/// Drain the remaining events of a finished session.
pub async fn drain(mut events: SessionEvents) -> Vec<SessionEvent> {
    let mut rest = Vec::new();
    while let Some(event) = events.next_event().await {
        rest.push(event);
    }
    rest
}

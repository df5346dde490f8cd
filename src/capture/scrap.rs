// # Scrap Capture Source
//
// Live capture of the primary display through the `scrap` library.
//
// `scrap::Capturer` is not `Send` on every platform, so it lives on a
// dedicated grab thread for the whole session. `capture()` sends a request to
// that thread and awaits the reply; the async side never touches the
// capturer.
//
// ```text
// ┌──────────────┐  GrabRequest   ┌──────────────┐
// │ session task │───────────────▶│ grab thread  │──▶ scrap::Capturer
// │  (async)     │◀───────────────│ (std thread) │
// └──────────────┘  BGRA Frame    └──────────────┘
// ```
//
// Frames keep scrap's native BGRA layout and row stride; the region is
// cropped out on the async side.

use std::io::ErrorKind;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cap_stitch::{Frame, PixelFormat};
use scrap::{Capturer, Display};
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::{CaptureRegion, CaptureSource};
use crate::error::{CaptureError, CaptureResult};

/// How long to wait for the display to deliver a fresh frame.
const GRAB_TIMEOUT: Duration = Duration::from_millis(500);

struct GrabRequest {
    reply: oneshot::Sender<CaptureResult<Frame>>,
}

/// Primary-display capture source.
#[derive(Debug)]
pub struct ScrapCaptureSource {
    requests: std_mpsc::Sender<GrabRequest>,
    width: u32,
    height: u32,
}

impl ScrapCaptureSource {
    /// Open the primary display and start the grab thread.
    pub fn primary() -> CaptureResult<Self> {
        let (requests, inbox) = std_mpsc::channel::<GrabRequest>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<CaptureResult<(u32, u32)>>();

        thread::Builder::new()
            .name("scrap-grab".into())
            .spawn(move || grab_thread(inbox, ready_tx))
            .map_err(|e| CaptureError::io("spawn grab thread", e))?;

        let (width, height) = ready_rx.recv().map_err(|_| {
            CaptureError::capture_failed("grab thread exited during startup")
        })??;
        info!(width, height, "primary display opened");
        Ok(Self {
            requests,
            width,
            height,
        })
    }

    /// Size of the whole display in pixels.
    pub fn display_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[async_trait]
impl CaptureSource for ScrapCaptureSource {
    async fn capture(&mut self, region: &CaptureRegion) -> CaptureResult<Frame> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(GrabRequest { reply })
            .map_err(|_| CaptureError::capture_failed("grab thread is gone"))?;
        let screen = response
            .await
            .map_err(|_| CaptureError::capture_failed("grab thread dropped the request"))??;
        region.crop(&screen)
    }

    fn name(&self) -> &str {
        "scrap"
    }
}

fn grab_thread(
    inbox: std_mpsc::Receiver<GrabRequest>,
    ready: std_mpsc::Sender<CaptureResult<(u32, u32)>>,
) {
    let opened = Display::primary()
        .and_then(Capturer::new)
        .map_err(|e| {
            CaptureError::capture_failed(format!("scrap: cannot open primary display: {}", e))
                .with_recovery_suggestion("Check that a display is attached and capture is permitted")
        });
    let mut capturer = match opened {
        Ok(capturer) => capturer,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let width = capturer.width() as u32;
    let height = capturer.height() as u32;
    if ready.send(Ok((width, height))).is_err() {
        return;
    }

    let epoch = Instant::now();
    let mut last: Option<Frame> = None;
    // Exits when the source, and with it the request sender, is dropped.
    for request in inbox {
        let frame = match grab(&mut capturer, width, height, epoch) {
            Ok(Some(frame)) => {
                last = Some(frame.clone());
                Ok(frame)
            }
            // Some backends only deliver frames when the screen changes.
            Ok(None) => last.clone().ok_or_else(|| {
                CaptureError::capture_failed("scrap: no frame before timeout")
            }),
            Err(e) => Err(e),
        };
        let _ = request.reply.send(frame);
    }
    debug!("grab thread stopped");
}

/// Grab a fresh frame; `Ok(None)` if none arrived within [`GRAB_TIMEOUT`].
fn grab(
    capturer: &mut Capturer,
    width: u32,
    height: u32,
    epoch: Instant,
) -> CaptureResult<Option<Frame>> {
    let deadline = Instant::now() + GRAB_TIMEOUT;
    loop {
        match capturer.frame() {
            Ok(buffer) => {
                let stride = buffer.len() / height as usize;
                let frame = Frame::new(
                    width,
                    height,
                    stride,
                    PixelFormat::Bgra8,
                    epoch.elapsed().as_nanos() as u64,
                    buffer.to_vec(),
                )?;
                return Ok(Some(frame));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                // no frame ready yet, small nap
                thread::sleep(Duration::from_millis(2));
            }
            Err(e) => return Err(CaptureError::capture_failed(format!("scrap frame error: {}", e))),
        }
    }
}

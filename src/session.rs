//! # Scroll Capture Sessions
//!
//! [`SessionController`] runs one scrolling capture at a time:
//!
//! ```text
//! Idle ──▶ SelectingRegion ──▶ Monitoring ──▶ Finishing ──▶ Stitching ──▶ Complete
//!  ▲              │                 │              │             └──────▶ Failed
//!  └──────────────┴─────────────────┴──────────────┘  cancel
//! ```
//!
//! While `Monitoring`, every detector signal appends one frame. The caller's
//! "done" ([`FinishSignal::finish`]) takes one last capture, freezes the frame
//! list, and hands that immutable snapshot to a blocking worker for stitching.
//! Cancel ([`CancelSignal::cancel`]) is honoured up to and including
//! `Finishing`; once stitching starts the session always runs to `Complete`
//! or `Failed`.
//!
//! Both signals consume themselves, so each can fire at most once. Dropping a
//! signal without firing it never fires it. A session nobody can reach any
//! more (its outcome dropped, or both signals dropped unused) is abandoned the
//! same way as a cancel, freeing the controller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use scroll_capture::{CaptureRegion, ImageSequenceSource, SessionController, StitchConfig};
//!
//! # async fn demo() -> scroll_capture::CaptureResult<()> {
//! let controller = SessionController::new(StitchConfig::default())?;
//! let source = ImageSequenceSource::from_dir("recorded/")?;
//! let capture = controller.start(source, CaptureRegion::new(0, 0, 800, 600)?)?;
//!
//! capture.finish.finish();
//! let stitched = capture.outcome.wait().await?;
//! println!("{} rows", stitched.image.height);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use cap_stitch::{Frame, FrameSequence, StitchOutput, stitch_frames};
use futures_util::Stream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::capture::{CaptureRegion, CaptureSource};
use crate::config::StitchConfig;
use crate::detector::ScrollDetector;
use crate::error::{CaptureError, CaptureResult, ErrorSeverity};

/// The stitched image together with the plan and overlaps that produced it.
pub type StitchedCapture = StitchOutput;

/// Lifecycle state of the controller's current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    SelectingRegion,
    Monitoring,
    Finishing,
    Stitching,
    Complete,
    Failed,
}

impl SessionState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle | Complete | Failed, SelectingRegion)
                | (SelectingRegion, Idle | Monitoring)
                | (Monitoring, Finishing | Idle | Failed)
                | (Finishing, Stitching | Idle | Failed)
                | (Stitching, Complete | Failed)
        )
    }

    /// A session is using the controller in this state.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Monitoring | Self::Finishing | Self::Stitching
        )
    }

    /// Cancel is honoured in this state.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            Self::SelectingRegion | Self::Monitoring | Self::Finishing
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Progress notifications of one session, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A frame was appended; `captured_count` includes the seed frame.
    FrameCaptured { captured_count: usize },
    Completed { height: u32, frame_count: usize },
    Failed { reason: String },
}

/// Receiving end of a session's events. The stream ends after the terminal
/// event.
#[derive(Debug)]
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }
}

impl Stream for SessionEvents {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// The user's "done" action. Consumed on use.
#[derive(Debug)]
pub struct FinishSignal {
    tx: oneshot::Sender<()>,
}

impl FinishSignal {
    /// Ask the session to take its last frame and stitch. Returns `false` if
    /// the session already ended.
    pub fn finish(self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Cancellation token. Consumed on use.
#[derive(Debug)]
pub struct CancelSignal {
    tx: oneshot::Sender<()>,
}

impl CancelSignal {
    /// Abandon the session and discard its frames. Returns `false` if the
    /// session can no longer be cancelled (stitching started or it ended).
    pub fn cancel(self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Terminal result of a session.
#[derive(Debug)]
pub struct SessionOutcome {
    rx: oneshot::Receiver<CaptureResult<StitchedCapture>>,
}

impl SessionOutcome {
    /// Wait for the stitched image, a failure, or [`CaptureError::Cancelled`].
    pub async fn wait(self) -> CaptureResult<StitchedCapture> {
        self.rx.await.unwrap_or_else(|_| {
            Err(CaptureError::state(
                "unknown",
                "wait",
                "session task ended without reporting an outcome",
            ))
        })
    }
}

/// Handles to a running scroll capture.
#[derive(Debug)]
pub struct ScrollCapture {
    pub events: SessionEvents,
    pub finish: FinishSignal,
    pub cancel: CancelSignal,
    pub outcome: SessionOutcome,
}

/// Receiver side of a one-shot signal.
#[derive(Debug)]
enum Trigger {
    Armed(oneshot::Receiver<()>),
    Fired,
    /// Dropped unused, or closed by the session.
    Gone,
}

impl Trigger {
    /// Resolves once the sender fires or goes away, `true` if it fired.
    /// Pending forever after that.
    async fn recv(&mut self) -> bool {
        let Trigger::Armed(rx) = &mut *self else {
            return std::future::pending().await;
        };
        let fired = rx.await.is_ok();
        *self = if fired { Trigger::Fired } else { Trigger::Gone };
        fired
    }

    /// Stop accepting the signal. Returns `true` if it fired first.
    fn close(&mut self) -> bool {
        let fired = match self {
            Trigger::Armed(rx) => {
                rx.close();
                rx.try_recv().is_ok()
            }
            Trigger::Fired => true,
            Trigger::Gone => false,
        };
        *self = Trigger::Gone;
        fired
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Finish,
    Cancel,
    /// No handle is left that could finish, cancel or collect the session.
    CallerGone,
}

/// The session's end of the caller's handles.
struct Controls {
    finish: Trigger,
    cancel: Trigger,
    outcome: oneshot::Sender<CaptureResult<StitchedCapture>>,
}

impl Controls {
    fn caller_gone(&self) -> bool {
        self.outcome.is_closed()
            || matches!((&self.finish, &self.cancel), (Trigger::Gone, Trigger::Gone))
    }

    /// Wait for the caller's next action. A "done" is only reported when
    /// `accept_finish`; one that arrives earlier is held until then.
    async fn next(&mut self, accept_finish: bool) -> Control {
        loop {
            if self.caller_gone() {
                return Control::CallerGone;
            }
            let held_finish = accept_finish && matches!(self.finish, Trigger::Fired);
            tokio::select! {
                biased;
                fired = self.cancel.recv() => {
                    if fired {
                        return Control::Cancel;
                    }
                }
                _ = std::future::ready(()), if held_finish => return Control::Finish,
                _ = self.finish.recv() => {}
                _ = self.outcome.closed() => {}
            }
        }
    }
}

#[derive(Debug, Clone)]
struct StateCell {
    state: Arc<Mutex<SessionState>>,
}

impl StateCell {
    fn get(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: SessionState, operation: &str) -> CaptureResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.can_transition_to(next) {
            return Err(CaptureError::state(
                state.to_string(),
                operation,
                format!("cannot move to {}", next),
            ));
        }
        let from = *state;
        debug!(%from, to = %next, "session state");
        *state = next;
        Ok(())
    }
}

/// Orchestrates scroll capture sessions, one at a time.
#[derive(Debug)]
pub struct SessionController {
    config: StitchConfig,
    state: StateCell,
}

impl SessionController {
    /// Create a controller, validating `config` once up front.
    pub fn new(config: StitchConfig) -> CaptureResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: StateCell {
                state: Arc::new(Mutex::new(SessionState::Idle)),
            },
        })
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Enter `SelectingRegion` while an external UI picks the rectangle.
    pub fn begin_region_selection(&self) -> CaptureResult<()> {
        self.state
            .transition(SessionState::SelectingRegion, "begin_region_selection")
    }

    /// Abandon region selection and return to `Idle`.
    pub fn cancel_region_selection(&self) -> CaptureResult<()> {
        self.state.transition(SessionState::Idle, "cancel_region_selection")
    }

    /// Start monitoring `region` through `source`.
    ///
    /// Accepted from `Idle`, `SelectingRegion`, `Complete` and `Failed`;
    /// refused while another session is active. Must be called within a
    /// Tokio runtime.
    pub fn start<S>(&self, source: S, region: CaptureRegion) -> CaptureResult<ScrollCapture>
    where
        S: CaptureSource + 'static,
    {
        let current = self.state.get();
        if current.is_active() {
            return Err(CaptureError::state(
                current.to_string(),
                "start",
                "a scroll capture is already running",
            ));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        if current != SessionState::SelectingRegion {
            self.state.transition(SessionState::SelectingRegion, "start")?;
            let _ = event_tx.send(SessionEvent::StateChanged(SessionState::SelectingRegion));
        }
        self.state.transition(SessionState::Monitoring, "start")?;
        let _ = event_tx.send(SessionEvent::StateChanged(SessionState::Monitoring));

        let (finish_tx, finish_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        info!(region = %region, source = source.name(), "scroll capture started");
        let task = SessionTask {
            config: self.config,
            state: self.state.clone(),
            events: event_tx,
            region,
            controls: Controls {
                finish: Trigger::Armed(finish_rx),
                cancel: Trigger::Armed(cancel_rx),
                outcome: outcome_tx,
            },
        };
        tokio::spawn(task.run(source));

        Ok(ScrollCapture {
            events: SessionEvents { rx: event_rx },
            finish: FinishSignal { tx: finish_tx },
            cancel: CancelSignal { tx: cancel_tx },
            outcome: SessionOutcome { rx: outcome_rx },
        })
    }
}

/// How the monitoring loop ended.
enum MonitorExit {
    Finish,
    Cancelled,
    Failed(CaptureError),
}

struct SessionTask {
    config: StitchConfig,
    state: StateCell,
    events: mpsc::UnboundedSender<SessionEvent>,
    region: CaptureRegion,
    controls: Controls,
}

impl SessionTask {
    fn emit(&self, event: SessionEvent) {
        // A caller that dropped its event stream still gets the outcome.
        let _ = self.events.send(event);
    }

    fn enter(&self, next: SessionState) -> CaptureResult<()> {
        self.state.transition(next, "session")?;
        self.emit(SessionEvent::StateChanged(next));
        Ok(())
    }

    fn fail(&self, error: CaptureError) -> CaptureError {
        let stage = self.state.get();
        let error = error
            .with_severity(ErrorSeverity::Fatal)
            .with_metadata("stage", stage.to_string());
        error!(stage = %stage, error = %error, "scroll capture failed");
        if self.enter(SessionState::Failed).is_ok() {
            self.emit(SessionEvent::Failed {
                reason: error.to_string(),
            });
        }
        error
    }

    fn abandon(&self, stage: SessionState) -> CaptureError {
        if self.controls.caller_gone() {
            info!(stage = %stage, "scroll capture abandoned, caller went away");
        } else {
            info!(stage = %stage, "scroll capture cancelled");
        }
        let _ = self.enter(SessionState::Idle);
        CaptureError::cancelled(stage.to_string())
    }

    fn append(&self, frames: &mut FrameSequence, frame: Frame) -> CaptureResult<()> {
        let index = frames.append(frame)?;
        debug!(frame = index, "frame appended");
        self.emit(SessionEvent::FrameCaptured {
            captured_count: frames.len(),
        });
        Ok(())
    }

    /// Capture once, giving up early on cancel. `Ok(None)` means cancelled.
    async fn capture_or_cancel<S: CaptureSource>(
        &mut self,
        source: &mut S,
    ) -> CaptureResult<Option<Frame>> {
        tokio::select! {
            biased;
            _ = self.controls.next(false) => Ok(None),
            frame = source.capture(&self.region) => frame.map(Some),
        }
    }

    async fn run<S: CaptureSource>(mut self, source: S) {
        let outcome = self.drive(source).await;
        let _ = self.controls.outcome.send(outcome);
    }

    async fn drive<S: CaptureSource>(&mut self, mut source: S) -> CaptureResult<StitchedCapture> {
        let mut frames = FrameSequence::new();

        let seed = match self.capture_or_cancel(&mut source).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(self.abandon(SessionState::Monitoring)),
            Err(e) => return Err(self.fail(e.with_operation("initial_capture"))),
        };
        if let Err(e) = self.append(&mut frames, seed.clone()) {
            return Err(self.fail(e));
        }

        let mut detector = ScrollDetector::new(self.config.detector, seed);
        match self.monitor(&mut detector, &mut source, &mut frames).await {
            MonitorExit::Finish => {}
            MonitorExit::Cancelled => return Err(self.abandon(SessionState::Monitoring)),
            MonitorExit::Failed(e) => return Err(self.fail(e)),
        }
        detector.stop();

        if let Err(e) = self.enter(SessionState::Finishing) {
            return Err(self.fail(e));
        }
        match self.capture_or_cancel(&mut source).await {
            Ok(Some(last)) => {
                if let Err(e) = self.append(&mut frames, last) {
                    return Err(self.fail(e));
                }
            }
            Ok(None) => return Err(self.abandon(SessionState::Finishing)),
            Err(e) => return Err(self.fail(e.with_operation("finishing_capture"))),
        }
        let snapshot = frames.freeze();

        // Any cancel() after this point reports `false`.
        if self.controls.cancel.close() {
            return Err(self.abandon(SessionState::Finishing));
        }
        if let Err(e) = self.enter(SessionState::Stitching) {
            return Err(self.fail(e));
        }
        let overlap = self.config.overlap;
        let stitched = tokio::task::spawn_blocking(move || stitch_frames(&snapshot, &overlap))
            .await
            .map_err(|e| CaptureError::external("tokio", e).with_operation("stitching"))
            .and_then(|r| r.map_err(CaptureError::from));

        match stitched {
            Ok(output) => {
                if let Err(e) = self.enter(SessionState::Complete) {
                    return Err(self.fail(e));
                }
                info!(
                    frames = output.plan.entries.len(),
                    height = output.image.height,
                    "scroll capture complete"
                );
                self.emit(SessionEvent::Completed {
                    height: output.image.height,
                    frame_count: output.plan.entries.len(),
                });
                Ok(output)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Append a frame per detector signal until finish, cancel or a hard error.
    async fn monitor<S: CaptureSource>(
        &mut self,
        detector: &mut ScrollDetector,
        source: &mut S,
        frames: &mut FrameSequence,
    ) -> MonitorExit {
        let (signal_tx, mut signal_rx) = mpsc::channel(1);
        let monitoring = detector.run(source, &self.region, signal_tx);
        tokio::pin!(monitoring);

        loop {
            tokio::select! {
                biased;
                control = self.controls.next(true) => {
                    return match control {
                        Control::Finish => MonitorExit::Finish,
                        Control::Cancel | Control::CallerGone => MonitorExit::Cancelled,
                    };
                }
                Some(frame) = signal_rx.recv() => {
                    if let Err(e) = self.append(frames, frame) {
                        return MonitorExit::Failed(e);
                    }
                }
                _ = &mut monitoring => return MonitorExit::Finish,
            }
        }
    }
}

//! Scroll capture sessions driven through `SessionController` with scripted
//! displays.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{ScriptedSource, StalledSource, Step, drain, region, scrolled, wait_for_frames, window};
use futures_util::StreamExt;
use scroll_capture::error::{ErrorSeverity, HasSeverity};
use scroll_capture::{
    CaptureError, ScrollCapture, SessionController, SessionEvent, SessionState, StitchConfig,
    StitchError,
};

fn controller() -> SessionController {
    SessionController::new(StitchConfig::default()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_scroll_session_completes_with_stitched_page() {
    let frames = scrolled(160, 400, &[0, 100, 200], 31);
    let source = ScriptedSource::frames(frames);
    let calls = source.calls();
    let controller = controller();

    let mut capture = controller.start(source, region(160, 400)).unwrap();
    assert_eq!(controller.state(), SessionState::Monitoring);

    // Seed, then the 100ms probe; the 200ms probe is inside the cooldown and
    // the 300ms probe signals.
    let seen = wait_for_frames(&mut capture.events, 3).await;
    assert_eq!(
        &seen[..2],
        &[
            SessionEvent::StateChanged(SessionState::SelectingRegion),
            SessionEvent::StateChanged(SessionState::Monitoring),
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    assert!(capture.finish.finish());
    let stitched = capture.outcome.wait().await.unwrap();

    // The finishing capture repeats the last frame and collapses.
    assert_eq!(stitched.plan.entries.len(), 4);
    assert_eq!(stitched.image.height, 600);
    assert_eq!(stitched.image.bytes(), window(160, 600, 0, 31).bytes());
    assert_eq!(controller.state(), SessionState::Complete);

    let rest = drain(capture.events).await;
    assert_eq!(
        rest,
        vec![
            SessionEvent::StateChanged(SessionState::Finishing),
            SessionEvent::FrameCaptured { captured_count: 4 },
            SessionEvent::StateChanged(SessionState::Stitching),
            SessionEvent::StateChanged(SessionState::Complete),
            SessionEvent::Completed {
                height: 600,
                frame_count: 4
            },
        ]
    );

    // Nothing left to cancel.
    assert!(!capture.cancel.cancel());
}

#[tokio::test(start_paused = true)]
async fn test_finish_right_after_start_keeps_seed_and_final_frame() {
    let frames = scrolled(96, 400, &[0, 150], 32);
    let controller = controller();
    let capture = controller
        .start(ScriptedSource::frames(frames), region(96, 400))
        .unwrap();

    capture.finish.finish();
    let stitched = capture.outcome.wait().await.unwrap();
    assert_eq!(stitched.plan.entries.len(), 2);
    assert_eq!(stitched.image.height, 550);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_monitoring_discards_frames() {
    let frames = scrolled(96, 200, &[0, 50, 100], 33);
    let controller = controller();
    let mut capture = controller
        .start(ScriptedSource::frames(frames), region(96, 200))
        .unwrap();

    wait_for_frames(&mut capture.events, 2).await;
    assert!(capture.cancel.cancel());

    let err = capture.outcome.wait().await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(err, CaptureError::Cancelled { ref stage, .. } if stage == "Monitoring"));
    assert_eq!(controller.state(), SessionState::Idle);

    let rest = drain(capture.events).await;
    assert_eq!(rest.last(), Some(&SessionEvent::StateChanged(SessionState::Idle)));
    assert!(!rest.iter().any(|e| matches!(e, SessionEvent::Completed { .. })));

    // The session ended, so "done" has nothing to act on.
    assert!(!capture.finish.finish());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_seed_capture_is_stuck() {
    let controller = controller();
    let capture = controller.start(StalledSource, region(32, 32)).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(capture.cancel.cancel());

    let err = capture.outcome.wait().await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_finishing_capture_is_stuck() {
    let seed = window(64, 64, 0, 42);
    let source = ScriptedSource::new(vec![Step::Frame(seed), Step::Stall]);
    let controller = controller();
    let mut capture = controller.start(source, region(64, 64)).unwrap();

    wait_for_frames(&mut capture.events, 1).await;
    assert!(capture.finish.finish());
    assert_eq!(
        capture.events.next_event().await,
        Some(SessionEvent::StateChanged(SessionState::Finishing))
    );
    assert_eq!(controller.state(), SessionState::Finishing);

    assert!(capture.cancel.cancel());
    let err = capture.outcome.wait().await.unwrap_err();
    assert!(matches!(err, CaptureError::Cancelled { ref stage, .. } if stage == "Finishing"));
    assert_eq!(controller.state(), SessionState::Idle);

    // The seed frame is discarded, nothing is stitched.
    let rest = drain(capture.events).await;
    assert_eq!(rest, vec![SessionEvent::StateChanged(SessionState::Idle)]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_refused_once_stitching() {
    let frames = scrolled(96, 300, &[0, 100], 43);
    let controller = controller();
    let mut capture = controller
        .start(ScriptedSource::frames(frames), region(96, 300))
        .unwrap();

    capture.finish.finish();
    loop {
        match capture.events.next_event().await {
            Some(SessionEvent::StateChanged(SessionState::Stitching)) => break,
            Some(_) => continue,
            None => panic!("session ended before stitching"),
        }
    }
    assert!(!capture.cancel.cancel());

    let stitched = capture.outcome.wait().await.unwrap();
    assert_eq!(stitched.image.height, 400);
    assert_eq!(controller.state(), SessionState::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_frees_the_controller() {
    let frames = scrolled(64, 200, &[0, 40, 80], 44);
    let source = ScriptedSource::frames(frames);
    let calls = source.calls();
    let controller = controller();

    let capture = controller.start(source, region(64, 200)).unwrap();
    drop(capture);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(controller.state(), SessionState::Idle);

    // The abandoned session stopped polling the display.
    let polled = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), polled);

    let next = controller
        .start(
            ScriptedSource::frames(vec![window(64, 64, 0, 45)]),
            region(64, 64),
        )
        .unwrap();
    next.finish.finish();
    assert_eq!(next.outcome.wait().await.unwrap().image.height, 64);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_both_signals_abandons_session() {
    let controller = controller();
    let ScrollCapture {
        events,
        finish,
        cancel,
        outcome,
    } = controller
        .start(
            ScriptedSource::frames(vec![window(48, 48, 0, 46)]),
            region(48, 48),
        )
        .unwrap();

    drop(finish);
    drop(cancel);
    let err = outcome.wait().await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(
        drain(events).await.last(),
        Some(&SessionEvent::StateChanged(SessionState::Idle))
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropped_finish_signal_never_fires() {
    let frame = window(48, 48, 0, 34);
    let controller = controller();
    let capture = controller
        .start(ScriptedSource::frames(vec![frame]), region(48, 48))
        .unwrap();

    drop(capture.finish);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(controller.state(), SessionState::Monitoring);

    assert!(capture.cancel.cancel());
    assert!(capture.outcome.wait().await.unwrap_err().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_seed_capture_failure_fails_session() {
    let controller = controller();
    let capture = controller
        .start(ScriptedSource::new(vec![Step::Fail]), region(64, 64))
        .unwrap();

    let err = capture.outcome.wait().await.unwrap_err();
    assert_eq!(err.category(), "capture_failed");
    assert_eq!(err.context().operation.as_deref(), Some("initial_capture"));
    assert_eq!(err.severity(), ErrorSeverity::Fatal);
    assert_eq!(
        err.context().metadata.get("stage").map(String::as_str),
        Some("Monitoring")
    );
    assert_eq!(controller.state(), SessionState::Failed);

    let events: Vec<SessionEvent> = capture.events.collect().await;
    assert_eq!(
        events[events.len() - 2],
        SessionEvent::StateChanged(SessionState::Failed)
    );
    assert!(matches!(events.last(), Some(SessionEvent::Failed { .. })));

    // A failed controller accepts a new session.
    let retry = controller
        .start(
            ScriptedSource::frames(vec![window(64, 64, 0, 35)]),
            region(64, 64),
        )
        .unwrap();
    retry.finish.finish();
    assert_eq!(retry.outcome.wait().await.unwrap().image.height, 64);
}

#[tokio::test(start_paused = true)]
async fn test_transient_probe_failures_do_not_end_monitoring() {
    let frames = scrolled(96, 300, &[0, 80], 36);
    let source = ScriptedSource::new(vec![
        Step::Frame(frames[0].clone()),
        Step::Fail,
        Step::Fail,
        Step::Frame(frames[1].clone()),
    ]);
    let controller = controller();
    let mut capture = controller.start(source, region(96, 300)).unwrap();

    wait_for_frames(&mut capture.events, 2).await;
    capture.finish.finish();
    let stitched = capture.outcome.wait().await.unwrap();
    assert_eq!(stitched.image.height, 380);
}

#[tokio::test(start_paused = true)]
async fn test_width_change_mid_session_is_a_hard_error() {
    let source = ScriptedSource::frames(vec![window(96, 80, 0, 37), window(64, 80, 0, 37)]);
    let controller = controller();
    let capture = controller.start(source, region(96, 80)).unwrap();

    let err = capture.outcome.wait().await.unwrap_err();
    assert!(matches!(
        err.as_stitch(),
        Some(StitchError::DimensionMismatch {
            expected_width: 96,
            found_width: 64,
            ..
        })
    ));
    assert_eq!(controller.state(), SessionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_one_session_at_a_time() {
    let controller = controller();
    let first = controller
        .start(
            ScriptedSource::frames(vec![window(32, 32, 0, 38)]),
            region(32, 32),
        )
        .unwrap();

    let refused = controller
        .start(
            ScriptedSource::frames(vec![window(32, 32, 0, 39)]),
            region(32, 32),
        )
        .unwrap_err();
    assert_eq!(refused.category(), "state");

    first.cancel.cancel();
    first.outcome.wait().await.unwrap_err();

    let second = controller
        .start(
            ScriptedSource::frames(vec![window(32, 32, 0, 39)]),
            region(32, 32),
        )
        .unwrap();
    second.finish.finish();
    second.outcome.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_start_after_region_selection() {
    let controller = controller();
    controller.begin_region_selection().unwrap();

    let mut capture = controller
        .start(
            ScriptedSource::frames(vec![window(32, 32, 0, 40)]),
            region(32, 32),
        )
        .unwrap();
    // Already selecting: the only state event is the move to Monitoring.
    assert_eq!(
        capture.events.next_event().await,
        Some(SessionEvent::StateChanged(SessionState::Monitoring))
    );
    capture.cancel.cancel();
    capture.outcome.wait().await.unwrap_err();
}

#[tokio::test(start_paused = true)]
async fn test_replayed_directory_through_session() {
    let dir = tempfile::tempdir().unwrap();
    for (i, frame) in scrolled(120, 400, &[0, 100, 200], 41).iter().enumerate() {
        scroll_capture::replay::save_png(frame, dir.path().join(format!("{:03}.png", i))).unwrap();
    }

    let source = scroll_capture::ImageSequenceSource::from_dir(dir.path()).unwrap();
    let controller = controller();
    let mut capture = controller.start(source, region(120, 400)).unwrap();

    wait_for_frames(&mut capture.events, 3).await;
    capture.finish.finish();
    let stitched = capture.outcome.wait().await.unwrap();
    assert_eq!(stitched.image.height, 600);
    assert_eq!(
        stitched.image.to_rgba_vec(),
        window(120, 600, 0, 41).to_rgba_vec()
    );
}

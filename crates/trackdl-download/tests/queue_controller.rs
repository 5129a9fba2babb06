//! Integration tests for the queue controller.
//!
//! A [`ManualEngine`] holds every engine request open until the test resolves
//! it, so each test controls exactly when a track finishes and which engine
//! events arrive in between.
//!
//! # What is tested
//!
//! - Single-flight dispatch in queue order
//! - Full-success, partial-failure and cancelled runs
//! - Rate-limit pause, resume and exhaustion
//! - Authoritative engine counts and consistency faults
//! - Start/reset/retry guards
//! - Stale results from a previous run

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, seeds, wait_for};
use mockall::mock;
use trackdl_core::download::{
    AppError, EngineEvent, ErrorCode, FailureCategory, ProgressEvent, QueueCancelledEvent,
    QueueCompleteEvent, QueueError, QueueProgressEvent, TrackId, TrackStatus, classify,
    group_failures_by_reason,
};
use trackdl_core::ports::{
    DispatchError, DownloadEngine, EngineEventSink, QueuePort, StartRequest, TrackDownloadRequest,
};
use trackdl_download::{EngineEventChannel, QueueConfig, spawn_queue_controller};

fn deliver(harness: &Harness, event: impl Into<EngineEvent>) {
    harness.queue.event_sink().deliver(event.into());
}

/// Complete the next `n` dispatches in order.
async fn complete_next(harness: &Harness, n: usize) {
    for _ in 0..n {
        harness.next_dispatch().await.complete();
    }
}

// ── Sequencing ─────────────────────────────────────────────────────

#[tokio::test]
async fn dispatches_one_track_at_a_time_in_order() {
    let harness = Harness::new();
    harness
        .queue
        .start(StartRequest::new(seeds(3)).with_album("Live"))
        .await
        .unwrap();

    let first = harness.next_dispatch().await;
    assert_eq!(first.track_id(), "t0");
    assert_eq!(first.request.track_number, Some(1));
    assert_eq!(first.request.total_tracks, Some(3));
    assert_eq!(first.request.album.as_deref(), Some("Live"));
    assert_eq!(
        first.request.track_url,
        "https://api.soundcloud.com/tracks/t0"
    );
    harness.assert_no_dispatch().await;

    let snapshot = harness.queue.snapshot();
    assert!(snapshot.state.is_processing);
    assert_eq!(snapshot.state.tracks[0].status, TrackStatus::Downloading);
    assert_eq!(snapshot.state.tracks[1].status, TrackStatus::Pending);

    first.complete();
    let second = harness.next_dispatch().await;
    assert_eq!(second.track_id(), "t1");
    assert_eq!(harness.queue.snapshot().state.current_index, 1);
    harness.assert_no_dispatch().await;
}

#[tokio::test]
async fn terminal_event_alone_does_not_advance() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();
    let first = harness.next_dispatch().await;

    deliver(&harness, ProgressEvent::new("t0", TrackStatus::Complete));
    harness
        .wait_for(|s| s.state.tracks[0].status == TrackStatus::Complete)
        .await;
    harness.assert_no_dispatch().await;
    assert_eq!(harness.queue.snapshot().state.current_index, 0);

    first.complete();
    assert_eq!(harness.next_dispatch().await.track_id(), "t1");
}

#[tokio::test]
async fn ten_tracks_all_complete() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(10))).await.unwrap();
    complete_next(&harness, 10).await;

    let snapshot = harness.wait_for(|s| s.state.is_complete).await;
    assert_eq!(snapshot.summary.completed_count, 10);
    assert_eq!(snapshot.summary.failed_count, 0);
    assert!(snapshot.summary.is_full_success);
    assert!(!snapshot.state.is_processing);
    assert_eq!(snapshot.progress.percentage, 100);

    deliver(
        &harness,
        QueueCompleteEvent {
            completed: 10,
            failed: 0,
            total: 10,
            failed_tracks: Vec::new(),
        },
    );
    let snapshot = harness.wait_for(|s| s.state.engine_reconciled).await;
    assert!(snapshot.state.consistency_fault.is_none());
    assert!(snapshot.summary.is_full_success);
}

#[tokio::test]
async fn two_unavailable_failures() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(10))).await.unwrap();
    for i in 0..10 {
        let dispatch = harness.next_dispatch().await;
        if i == 2 || i == 5 {
            dispatch.fail(AppError::download_failed("track unavailable"));
        } else {
            dispatch.complete();
        }
    }

    let snapshot = harness.wait_for(|s| s.state.is_complete).await;
    assert_eq!(snapshot.summary.failed_count, 2);
    assert_eq!(snapshot.summary.completed_count, 8);
    assert!(snapshot.summary.has_failures);
    assert!(!snapshot.summary.is_full_success);

    assert_eq!(snapshot.failed.len(), 2);
    assert!(
        snapshot
            .failed
            .iter()
            .all(|t| classify(&t.error) == FailureCategory::Unavailable)
    );
    let groups = group_failures_by_reason(&snapshot.failed);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[&FailureCategory::Unavailable].len(), 2);
}

#[tokio::test]
async fn failure_event_before_dispatch_result() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();
    let first = harness.next_dispatch().await;

    deliver(
        &harness,
        ProgressEvent::failed("t0", AppError::new(ErrorCode::GeoBlocked, "blocked")),
    );
    harness
        .wait_for(|s| s.state.tracks[0].status == TrackStatus::Failed)
        .await;
    first.fail(AppError::new(ErrorCode::GeoBlocked, "blocked"));

    assert_eq!(harness.next_dispatch().await.track_id(), "t1");
    let snapshot = harness.queue.snapshot();
    assert_eq!(snapshot.state.failed_count, 1);
    assert_eq!(
        snapshot.state.tracks[0].error.as_ref().map(|e| e.code),
        Some(ErrorCode::GeoBlocked)
    );
}

// ── Cancellation ───────────────────────────────────────────────────

#[tokio::test]
async fn cancel_after_three_of_ten() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(10))).await.unwrap();
    complete_next(&harness, 3).await;
    let in_flight = harness.next_dispatch().await;

    harness.queue.cancel().await.unwrap();
    harness.queue.cancel().await.unwrap();
    let snapshot = harness.queue.snapshot();
    assert!(snapshot.state.is_cancelling);
    assert!(!snapshot.state.is_cancelled);
    assert_eq!(snapshot.summary.cancelled_count, 0);

    in_flight.cancelled();
    harness.assert_no_dispatch().await;

    deliver(
        &harness,
        QueueCancelledEvent {
            completed: 3,
            cancelled: 7,
            total: 10,
        },
    );
    let snapshot = harness.wait_for(|s| s.state.is_cancelled).await;
    assert_eq!(snapshot.summary.completed_count, 3);
    assert_eq!(snapshot.summary.cancelled_count, 7);
    assert!(snapshot.summary.is_complete);
    assert!(!snapshot.summary.is_full_success);
    assert!(!snapshot.state.is_processing);
    assert!(!snapshot.state.is_cancelling);
    assert!(snapshot.state.consistency_fault.is_none());
    assert_eq!(harness.engine.cancel_calls(), 1);
}

#[tokio::test]
async fn cancel_stops_dispatch_even_if_track_completes() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(3))).await.unwrap();
    let first = harness.next_dispatch().await;

    harness.queue.cancel().await.unwrap();
    first.complete();
    harness
        .wait_for(|s| s.state.tracks[0].status == TrackStatus::Complete)
        .await;
    harness.assert_no_dispatch().await;

    let snapshot = harness.queue.snapshot();
    assert!(snapshot.state.is_processing);
    assert!(!snapshot.state.is_complete);
}

#[tokio::test]
async fn engine_side_cancel_ends_the_run() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();

    harness.next_dispatch().await.cancelled();
    let snapshot = harness.wait_for(|s| s.state.is_cancelling).await;
    assert!(snapshot.state.is_processing);
    harness.assert_no_dispatch().await;
    harness.wait_for_cancel_calls(1).await;

    deliver(
        &harness,
        QueueCancelledEvent {
            completed: 0,
            cancelled: 2,
            total: 2,
        },
    );
    let snapshot = harness.wait_for(|s| s.state.is_cancelled).await;
    assert!(!snapshot.state.is_processing);
    assert_eq!(snapshot.summary.cancelled_count, 2);

    harness.queue.start(StartRequest::new(seeds(1))).await.unwrap();
    assert_eq!(harness.next_dispatch().await.track_id(), "t0");
}

#[tokio::test]
async fn cancel_while_idle_is_a_no_op() {
    let harness = Harness::new();
    harness.queue.cancel().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.engine.cancel_calls(), 0);
    assert!(!harness.queue.snapshot().state.is_cancelling);
}

// ── Rate limiting ──────────────────────────────────────────────────

// Assumes a rate limit pauses the whole queue on the current track; the
// engine owns any retry timing.
#[tokio::test]
async fn rate_limit_then_resume_keeps_position() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(3))).await.unwrap();
    let dispatch = harness.next_dispatch().await;

    deliver(&harness, ProgressEvent::new("t0", TrackStatus::RateLimited));
    let snapshot = harness.wait_for(|s| s.state.is_rate_limited).await;
    assert!(snapshot.state.is_processing);
    assert!(snapshot.state.rate_limited_at.is_some());
    assert!(snapshot.rate_limit.is_rate_limited);
    assert_eq!(snapshot.state.tracks[0].status, TrackStatus::RateLimited);

    deliver(&harness, ProgressEvent::new("t0", TrackStatus::Downloading));
    let snapshot = harness.wait_for(|s| !s.state.is_rate_limited).await;
    assert_eq!(snapshot.state.current_index, 0);
    assert_eq!(snapshot.state.tracks[0].status, TrackStatus::Downloading);
    harness.assert_no_dispatch().await;

    dispatch.complete();
    assert_eq!(harness.next_dispatch().await.track_id(), "t1");
}

#[tokio::test]
async fn rate_limit_exhaustion_fails_and_advances() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();
    let dispatch = harness.next_dispatch().await;

    deliver(&harness, ProgressEvent::new("t0", TrackStatus::RateLimited));
    harness.wait_for(|s| s.state.is_rate_limited).await;

    deliver(
        &harness,
        ProgressEvent::failed("t0", AppError::download_failed("too many retries")),
    );
    let snapshot = harness
        .wait_for(|s| s.state.tracks[0].status == TrackStatus::Failed)
        .await;
    assert!(!snapshot.state.is_rate_limited);
    assert_eq!(
        snapshot.state.tracks[0].error.as_ref().map(|e| e.code),
        Some(ErrorCode::RateLimited)
    );

    dispatch.fail(AppError::rate_limited("too many retries"));
    assert_eq!(harness.next_dispatch().await.track_id(), "t1");
}

#[tokio::test]
async fn finished_download_settles_a_paused_track() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();
    let dispatch = harness.next_dispatch().await;

    deliver(&harness, ProgressEvent::new("t0", TrackStatus::RateLimited));
    harness.wait_for(|s| s.state.is_rate_limited).await;

    // The engine's resume report never arrives; the download just finishes.
    dispatch.complete();
    assert_eq!(harness.next_dispatch().await.track_id(), "t1");
    let snapshot = harness.queue.snapshot();
    assert_eq!(snapshot.state.tracks[0].status, TrackStatus::Complete);
    assert!(!snapshot.state.is_rate_limited);
    assert_eq!(snapshot.state.completed_count, 1);
}

// ── Reconciliation ─────────────────────────────────────────────────

#[tokio::test]
async fn stale_and_illegal_events_are_ignored() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(3))).await.unwrap();
    let _dispatch = harness.next_dispatch().await;

    deliver(&harness, ProgressEvent::new("t2", TrackStatus::Complete));
    deliver(&harness, ProgressEvent::new("t0", TrackStatus::Pending));
    deliver(
        &harness,
        QueueProgressEvent {
            current: 3,
            total: 3,
            track_id: TrackId::new("t2"),
        },
    );
    deliver(
        &harness,
        ProgressEvent::new("t0", TrackStatus::Converting).with_percent(0.5),
    );

    let snapshot = harness
        .wait_for(|s| s.state.tracks[0].status == TrackStatus::Converting)
        .await;
    assert_eq!(snapshot.state.tracks[2].status, TrackStatus::Pending);
    assert_eq!(snapshot.state.current_index, 0);
    assert_eq!(snapshot.state.tracks[0].percent, Some(0.5));
}

#[tokio::test]
async fn mismatched_final_counts_are_recorded() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();
    complete_next(&harness, 2).await;
    harness.wait_for(|s| s.state.is_complete).await;

    deliver(
        &harness,
        QueueCompleteEvent {
            completed: 1,
            failed: 1,
            total: 2,
            failed_tracks: vec![(TrackId::new("t1"), "boom".to_string())],
        },
    );
    let snapshot = harness.wait_for(|s| s.state.engine_reconciled).await;
    let fault = snapshot.state.consistency_fault.clone().unwrap();
    assert_eq!(fault.event, "queue-complete");
    assert_eq!(fault.expected.completed, 2);
    assert_eq!(snapshot.summary.completed_count, 1);
    assert_eq!(snapshot.summary.failed_count, 1);

    // A second final report changes nothing.
    deliver(
        &harness,
        QueueCancelledEvent {
            completed: 0,
            cancelled: 2,
            total: 2,
        },
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    let again = harness.queue.snapshot();
    assert!(!again.state.is_cancelled);
    assert_eq!(again.summary.completed_count, 1);
}

#[tokio::test]
async fn late_final_report_is_not_applied_to_the_next_run() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();
    complete_next(&harness, 2).await;
    let first = harness.wait_for(|s| s.state.is_complete).await;
    assert!(!first.state.engine_reconciled);

    harness.queue.start(StartRequest::new(seeds(3))).await.unwrap();
    let current = harness.next_dispatch().await;

    // The first run's report arrives after the second run started.
    deliver(
        &harness,
        QueueCompleteEvent {
            completed: 2,
            failed: 0,
            total: 2,
            failed_tracks: Vec::new(),
        },
    );
    deliver(&harness, ProgressEvent::new("t0", TrackStatus::Converting));
    let snapshot = harness
        .wait_for(|s| s.state.tracks[0].status == TrackStatus::Converting)
        .await;
    assert!(snapshot.state.is_processing);
    assert!(!snapshot.state.is_complete);
    assert!(!snapshot.state.engine_reconciled);
    assert_eq!(snapshot.state.total_tracks, 3);
    assert_eq!(snapshot.summary.completed_count, 0);
    assert!(!snapshot.summary.is_full_success);

    current.complete();
    complete_next(&harness, 2).await;
    harness.wait_for(|s| s.state.is_complete).await;

    deliver(
        &harness,
        QueueCompleteEvent {
            completed: 3,
            failed: 0,
            total: 3,
            failed_tracks: Vec::new(),
        },
    );
    let snapshot = harness.wait_for(|s| s.state.engine_reconciled).await;
    assert!(snapshot.state.consistency_fault.is_none());
    assert_eq!(snapshot.summary.completed_count, 3);
    assert!(snapshot.summary.is_full_success);
}

// ── Guards ─────────────────────────────────────────────────────────

#[tokio::test]
async fn start_is_refused_while_processing() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();

    let err = harness
        .queue
        .start(StartRequest::new(seeds(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidState { .. }));
    assert_eq!(harness.queue.snapshot().state.total_tracks, 2);
}

#[tokio::test]
async fn start_validates_tracks() {
    let harness = Harness::new();
    assert_eq!(
        harness.queue.start(StartRequest::default()).await,
        Err(QueueError::EmptyQueue)
    );

    let mut tracks = seeds(2);
    tracks.push(tracks[0].clone());
    assert!(matches!(
        harness.queue.start(StartRequest::new(tracks)).await,
        Err(QueueError::DuplicateTrack { .. })
    ));
    assert!(!harness.queue.snapshot().state.has_run());
}

#[tokio::test]
async fn reset_is_refused_while_processing_and_idempotent_after() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(1))).await.unwrap();
    assert!(matches!(
        harness.queue.reset_queue().await,
        Err(QueueError::InvalidState { .. })
    ));

    harness.next_dispatch().await.complete();
    harness.wait_for(|s| s.state.is_complete).await;

    harness.queue.reset_queue().await.unwrap();
    let first = harness.queue.snapshot();
    harness.queue.reset_queue().await.unwrap();
    let second = harness.queue.snapshot();
    assert_eq!(first, second);
    assert!(!first.state.has_run());
    assert_eq!(first.state.total_tracks, 0);
    assert_eq!(first.summary.total_count, 0);
}

// ── Retry ──────────────────────────────────────────────────────────

#[tokio::test]
async fn retry_failed_starts_a_fresh_run() {
    let config = QueueConfig::new().with_output_dir(Some("/music".into()));
    let harness = Harness::with_config(config);
    harness.queue.start(StartRequest::new(seeds(3))).await.unwrap();
    harness.next_dispatch().await.complete();
    harness
        .next_dispatch()
        .await
        .fail(AppError::network("connection reset"));
    harness.next_dispatch().await.complete();
    let finished = harness.wait_for(|s| s.state.is_complete).await;

    assert_eq!(
        harness.queue.retry_track(TrackId::new("t0")).await,
        Err(QueueError::NotFailed {
            id: TrackId::new("t0")
        })
    );

    harness.queue.retry_failed().await.unwrap();
    let retry = harness.next_dispatch().await;
    assert_eq!(retry.track_id(), "t1");
    assert_eq!(retry.request.track_number, None);
    assert_eq!(retry.request.output_dir, Some("/music".into()));

    let snapshot = harness.queue.snapshot();
    assert_ne!(snapshot.state.run_id, finished.state.run_id);
    assert_eq!(snapshot.state.total_tracks, 1);
    assert!(snapshot.state.is_processing);

    retry.complete();
    let snapshot = harness.wait_for(|s| s.state.is_complete).await;
    assert!(snapshot.summary.is_full_success);
    assert_eq!(
        harness.queue.retry_failed().await,
        Err(QueueError::NothingToRetry)
    );
}

// ── Stale dispatch results ─────────────────────────────────────────

#[tokio::test]
async fn result_from_cancelled_run_is_not_applied_to_next_run() {
    let harness = Harness::new();
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();
    let old = harness.next_dispatch().await;

    harness.queue.cancel().await.unwrap();
    deliver(
        &harness,
        QueueCancelledEvent {
            completed: 0,
            cancelled: 2,
            total: 2,
        },
    );
    harness.wait_for(|s| s.state.is_cancelled).await;

    // The old request is still outstanding, so the new run waits for it.
    harness.queue.start(StartRequest::new(seeds(2))).await.unwrap();
    harness.assert_no_dispatch().await;
    assert_eq!(
        harness.queue.snapshot().state.tracks[0].status,
        TrackStatus::Pending
    );

    old.complete();
    let next = harness.next_dispatch().await;
    assert_eq!(next.track_id(), "t0");
    let snapshot = harness.queue.snapshot();
    assert_eq!(snapshot.state.tracks[0].status, TrackStatus::Downloading);
    assert_eq!(snapshot.state.completed_count, 0);
}

// ── Engine port expectations ───────────────────────────────────────

mock! {
    pub Engine {}

    #[async_trait::async_trait]
    impl DownloadEngine for Engine {
        async fn download_track(
            &self,
            request: TrackDownloadRequest,
        ) -> Result<std::path::PathBuf, DispatchError>;
        async fn cancel_queue(&self) -> Result<(), AppError>;
    }
}

#[tokio::test]
async fn repeated_cancel_reaches_engine_once() {
    let mut mock = MockEngine::new();
    mock.expect_download_track()
        .times(1)
        .returning(|_| Err(DispatchError::Cancelled));
    mock.expect_cancel_queue().times(1).returning(|| Ok(()));

    let mut engine = Arc::new(mock);
    let events = EngineEventChannel::new();
    let sink = events.sink();
    let queue = spawn_queue_controller(engine.clone(), events, QueueConfig::default());

    queue.start(StartRequest::new(seeds(4))).await.unwrap();
    queue.cancel().await.unwrap();
    queue.cancel().await.unwrap();
    queue.cancel().await.unwrap();

    sink.deliver(
        QueueCancelledEvent {
            completed: 0,
            cancelled: 4,
            total: 4,
        }
        .into(),
    );
    let snapshot = wait_for(queue.subscribe(), |s| s.state.is_cancelled).await;
    assert_eq!(snapshot.summary.cancelled_count, 4);

    // Wait for the controller and its spawned tasks to release the engine.
    drop(queue);
    drop(sink);
    let released = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(mock) = Arc::get_mut(&mut engine) {
                mock.checkpoint();
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "engine still referenced");
}

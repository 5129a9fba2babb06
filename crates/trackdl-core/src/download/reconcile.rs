//! Event reconciler.
//!
//! `apply(state, event) -> state'` for every [`EngineEvent`]. The reconciler is
//! the only place engine reports touch the track registry. It never advances
//! `current_index` and never dispatches; it reports what happened through
//! [`Outcome`] and the controller decides what to do next.
//!
//! # Design
//!
//! - Events for anything other than the current track are stale and ignored
//! - Illegal status edges are ignored and the prior state is kept
//! - `queue-complete`/`queue-cancelled` are authoritative: their counts replace
//!   the local tally, and any disagreement is recorded as a
//!   [`ConsistencyFault`] rather than raised
//! - At most one authoritative report is applied per run

use chrono::{DateTime, Utc};

use super::completion::Tally;
use super::errors::AppError;
use super::events::{
    EngineEvent, ProgressEvent, QueueCancelledEvent, QueueCompleteEvent, QueueProgressEvent,
};
use super::rate_limit;
use super::state::{ConsistencyFault, QueueState};
use super::track::{TrackId, TrackStatus};

/// Message attached to a `failed` report that arrived without an error.
const UNSPECIFIED_FAILURE: &str = "Download failed";

/// Why an event changed nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ignored {
    /// No run is processing.
    NotProcessing,
    /// An authoritative final report was already applied to this run.
    AlreadyFinalized,
    /// The event names a track other than the current one.
    StaleTrack { track_id: TrackId, current: Option<TrackId> },
    /// The reported status is not reachable from the track's status.
    IllegalTransition {
        track_id: TrackId,
        from: TrackStatus,
        to: TrackStatus,
    },
}

/// What applying an event did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The current track moved to a non-terminal status or refreshed progress.
    Updated { track_id: TrackId, status: TrackStatus },
    /// The current track reached `complete` or `failed`.
    Settled { track_id: TrackId, status: TrackStatus },
    /// The run paused on a rate limit.
    RateLimited { track_id: TrackId },
    /// The engine resumed after a rate limit.
    Resumed { track_id: TrackId },
    /// A `queue-progress` report that agrees with the controller.
    Advisory,
    /// A `queue-progress` report that disagrees with the controller.
    /// Positions are 1-based.
    PositionMismatch {
        reported: u32,
        expected: u32,
        reported_track: TrackId,
        expected_track: Option<TrackId>,
    },
    /// A `queue-complete` report finalized the run.
    Finalized { fault: Option<ConsistencyFault> },
    /// A `queue-cancelled` report finalized the run.
    Cancelled { fault: Option<ConsistencyFault> },
    Ignored(Ignored),
}

/// Next state plus what the event did.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    pub state: QueueState,
    pub outcome: Outcome,
}

impl Reconciled {
    fn new(state: QueueState, outcome: Outcome) -> Self {
        Self { state, outcome }
    }

    fn ignored(state: QueueState, why: Ignored) -> Self {
        Self::new(state, Outcome::Ignored(why))
    }
}

/// Apply one engine event. `now` timestamps a rate-limit pause.
#[must_use]
pub fn apply(state: QueueState, event: &EngineEvent, now: DateTime<Utc>) -> Reconciled {
    match event {
        EngineEvent::Progress(progress) => apply_progress(state, progress, now),
        EngineEvent::QueueProgress(position) => check_position(state, position),
        EngineEvent::QueueComplete(report) => apply_complete(state, report),
        EngineEvent::QueueCancelled(report) => apply_cancelled(state, report),
    }
}

fn is_rate_limit_signal(event: &ProgressEvent) -> bool {
    event.status == TrackStatus::RateLimited
        || (!event.status.is_terminal()
            && event.error.as_ref().is_some_and(AppError::is_rate_limited))
}

fn apply_progress(mut state: QueueState, event: &ProgressEvent, now: DateTime<Utc>) -> Reconciled {
    if !state.is_processing {
        return Reconciled::ignored(state, Ignored::NotProcessing);
    }
    let Some(from) = state
        .current_track()
        .filter(|track| track.id == event.track_id)
        .map(|track| track.status)
    else {
        let current = state.current_track().map(|track| track.id.clone());
        return Reconciled::ignored(
            state,
            Ignored::StaleTrack {
                track_id: event.track_id.clone(),
                current,
            },
        );
    };
    let track_id = event.track_id.clone();
    let illegal = |to: TrackStatus| Ignored::IllegalTransition {
        track_id: track_id.clone(),
        from,
        to,
    };

    if is_rate_limit_signal(event) {
        return if rate_limit::enter(&mut state, now) {
            let outcome = Outcome::RateLimited {
                track_id: track_id.clone(),
            };
            Reconciled::new(state, outcome)
        } else {
            Reconciled::ignored(state, illegal(TrackStatus::RateLimited))
        };
    }

    if from == TrackStatus::RateLimited {
        return match event.status {
            TrackStatus::Downloading if rate_limit::resume(&mut state, event.percent) => {
                let outcome = Outcome::Resumed {
                    track_id: track_id.clone(),
                };
                Reconciled::new(state, outcome)
            }
            TrackStatus::Failed if rate_limit::exhaust(&mut state, event.error.as_ref()) => {
                state.sync_counts();
                let outcome = Outcome::Settled {
                    track_id: track_id.clone(),
                    status: TrackStatus::Failed,
                };
                Reconciled::new(state, outcome)
            }
            to => Reconciled::ignored(state, illegal(to)),
        };
    }

    let error = (event.status == TrackStatus::Failed).then(|| {
        event
            .error
            .clone()
            .unwrap_or_else(|| AppError::download_failed(UNSPECIFIED_FAILURE))
    });
    let applied = state.current_track_mut().is_some_and(|track| {
        if !track.transition(event.status, error) {
            return false;
        }
        if !event.status.is_terminal() {
            track.percent = event.percent;
        }
        true
    });
    if !applied {
        return Reconciled::ignored(state, illegal(event.status));
    }

    let outcome = if event.status.is_terminal() {
        state.sync_counts();
        Outcome::Settled {
            track_id: track_id.clone(),
            status: event.status,
        }
    } else {
        Outcome::Updated {
            track_id: track_id.clone(),
            status: event.status,
        }
    };
    Reconciled::new(state, outcome)
}

fn check_position(state: QueueState, event: &QueueProgressEvent) -> Reconciled {
    if !state.has_run() {
        return Reconciled::ignored(state, Ignored::NotProcessing);
    }
    let expected = u32::try_from(state.current_index + 1).unwrap_or(u32::MAX);
    let expected_track = state.current_track().map(|track| track.id.clone());
    let outcome = if event.current == expected && expected_track.as_ref() == Some(&event.track_id)
    {
        Outcome::Advisory
    } else {
        Outcome::PositionMismatch {
            reported: event.current,
            expected,
            reported_track: event.track_id.clone(),
            expected_track,
        }
    };
    Reconciled::new(state, outcome)
}

fn guard_final(state: &QueueState) -> Option<Ignored> {
    if !state.has_run() {
        Some(Ignored::NotProcessing)
    } else if state.engine_reconciled {
        Some(Ignored::AlreadyFinalized)
    } else {
        None
    }
}

fn compare(
    event: &EngineEvent,
    expected: Tally,
    reported: Tally,
    expected_total: u32,
    reported_total: u32,
) -> Option<ConsistencyFault> {
    (expected != reported || expected_total != reported_total).then(|| ConsistencyFault {
        event: event.event_name().to_string(),
        expected,
        reported,
        expected_total,
        reported_total,
    })
}

fn apply_complete(mut state: QueueState, event: &QueueCompleteEvent) -> Reconciled {
    if let Some(why) = guard_final(&state) {
        return Reconciled::ignored(state, why);
    }
    let expected = Tally::of_registry(&state.tracks);
    let reported = Tally {
        completed: event.completed,
        failed: event.failed,
        cancelled: 0,
    };
    let fault = compare(
        &EngineEvent::QueueComplete(event.clone()),
        expected,
        reported,
        state.total_tracks,
        event.total,
    );

    state.completed_count = event.completed;
    state.failed_count = event.failed;
    state.cancelled_count = 0;
    state.finish();
    state.engine_reconciled = true;
    state.consistency_fault.clone_from(&fault);
    Reconciled::new(state, Outcome::Finalized { fault })
}

fn apply_cancelled(mut state: QueueState, event: &QueueCancelledEvent) -> Reconciled {
    if let Some(why) = guard_final(&state) {
        return Reconciled::ignored(state, why);
    }
    let local = Tally::of_registry(&state.tracks);
    let expected = Tally {
        cancelled: state
            .total_tracks
            .saturating_sub(local.completed + local.failed),
        ..local
    };
    // The engine does not report failures on cancel; the local count stands.
    let reported = Tally {
        completed: event.completed,
        failed: local.failed,
        cancelled: event.cancelled,
    };
    let fault = compare(
        &EngineEvent::QueueCancelled(event.clone()),
        expected,
        reported,
        state.total_tracks,
        event.total,
    );

    state.completed_count = reported.completed;
    state.failed_count = reported.failed;
    state.cancelled_count = reported.cancelled;
    state.is_cancelled = true;
    state.finish();
    state.engine_reconciled = true;
    state.consistency_fault.clone_from(&fault);
    Reconciled::new(state, Outcome::Cancelled { fault })
}

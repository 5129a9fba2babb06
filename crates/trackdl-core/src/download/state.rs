//! The authoritative queue snapshot.
//!
//! [`QueueState`] is a plain value. The reconciler and the controller produce
//! new states from old ones; the presentation layer only ever sees clones.
//!
//! # Index semantics
//!
//! - `current_index` is 0-based and never decreases within a run
//! - the track at `current_index` is the one dispatched (or about to be)
//! - `total_tracks` is fixed when the run starts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::completion::Tally;
use super::track::{Track, TrackSeed, TrackStatus};

/// Record of a disagreement between the local tally and an authoritative
/// engine report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyFault {
    /// Engine event that carried the report (`queue-complete`/`queue-cancelled`).
    pub event: String,
    /// What the orchestrator counted.
    pub expected: Tally,
    /// What the engine reported (and what the state now holds).
    pub reported: Tally,
    pub expected_total: u32,
    pub reported_total: u32,
}

/// Snapshot of one download run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    /// Identity of the run; `None` in the initial (reset) state.
    pub run_id: Option<Uuid>,
    /// Tracks in dispatch order.
    pub tracks: Vec<Track>,
    pub current_index: usize,
    pub total_tracks: u32,
    /// A dispatch is outstanding or the run is paused on a rate limit.
    pub is_processing: bool,
    pub is_complete: bool,
    /// Cancellation was requested but the engine has not confirmed it yet.
    pub is_cancelling: bool,
    pub is_cancelled: bool,
    pub completed_count: u32,
    pub failed_count: u32,
    pub cancelled_count: u32,
    pub is_rate_limited: bool,
    pub rate_limited_at: Option<DateTime<Utc>>,
    /// Album tag applied to every track of the run.
    pub album_name: Option<String>,
    /// Directory the run writes into (`None` = engine default).
    pub output_dir: Option<PathBuf>,
    /// An authoritative `queue-complete`/`queue-cancelled` has been applied.
    pub engine_reconciled: bool,
    pub consistency_fault: Option<ConsistencyFault>,
}

impl QueueState {
    /// Create a processing run over `seeds` positioned at the first track.
    #[must_use]
    pub fn begin(
        run_id: Uuid,
        seeds: Vec<TrackSeed>,
        album_name: Option<String>,
        output_dir: Option<PathBuf>,
    ) -> Self {
        let tracks: Vec<Track> = seeds.into_iter().map(Track::pending).collect();
        let total_tracks = u32::try_from(tracks.len()).unwrap_or(u32::MAX);

        Self {
            run_id: Some(run_id),
            tracks,
            total_tracks,
            is_processing: true,
            album_name,
            output_dir,
            ..Self::default()
        }
    }

    /// Whether a run exists (started and not reset).
    #[must_use]
    pub const fn has_run(&self) -> bool {
        self.run_id.is_some()
    }

    /// The track at `current_index`.
    #[must_use]
    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub(crate) fn current_track_mut(&mut self) -> Option<&mut Track> {
        self.tracks.get_mut(self.current_index)
    }

    /// The current track has reached `complete` or `failed`.
    #[must_use]
    pub fn current_is_settled(&self) -> bool {
        self.current_track()
            .is_some_and(|track| track.status.is_terminal())
    }

    /// Whether a track follows the current one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.current_index + 1 < self.tracks.len()
    }

    /// Move the current track from `pending` to `downloading`.
    ///
    /// Returns `false` (and changes nothing) if the current track was already
    /// dispatched or the run is over.
    pub fn mark_dispatched(&mut self) -> bool {
        if !self.is_processing {
            return false;
        }
        self.current_track_mut()
            .filter(|track| track.status == TrackStatus::Pending)
            .is_some_and(|track| track.transition(TrackStatus::Downloading, None))
    }

    /// Step to the next track. Returns `false` at the end of the run.
    pub fn step_forward(&mut self) -> bool {
        if self.has_next() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    /// Mark the run finished. Idempotent.
    pub fn finish(&mut self) {
        self.is_complete = true;
        self.is_processing = false;
        self.is_cancelling = false;
        self.is_rate_limited = false;
        self.rate_limited_at = None;
    }

    /// Record cancellation intent. Returns `false` if it was already recorded
    /// or there is nothing to cancel.
    pub fn request_cancel(&mut self) -> bool {
        if !self.is_processing || self.is_cancelling {
            return false;
        }
        self.is_cancelling = true;
        true
    }

    /// Recompute the completed/failed counts from the registry.
    pub(crate) fn sync_counts(&mut self) {
        let tally = Tally::of_registry(&self.tracks);
        self.completed_count = tally.completed;
        self.failed_count = tally.failed;
    }

    /// Counts currently held by the state.
    #[must_use]
    pub const fn tally(&self) -> Tally {
        Tally {
            completed: self.completed_count,
            failed: self.failed_count,
            cancelled: self.cancelled_count,
        }
    }
}

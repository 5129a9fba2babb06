//! Completion aggregation.
//!
//! Derived statistics the presentation layer renders: per-run counts and
//! success flags, the failed-track list and overall progress. Everything here
//! is a pure function of a [`QueueState`] or its track list.

use serde::{Deserialize, Serialize};

use super::errors::AppError;
use super::state::QueueState;
use super::track::{Track, TrackId, TrackStatus};

/// Outcome counts for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub completed: u32,
    pub failed: u32,
    pub cancelled: u32,
}

impl Tally {
    /// Count `complete` and `failed` tracks in the registry.
    ///
    /// The registry has no notion of cancellation, so `cancelled` is zero.
    #[must_use]
    pub fn of_registry(tracks: &[Track]) -> Self {
        tracks.iter().fold(Self::default(), |mut tally, track| {
            match track.status {
                TrackStatus::Complete => tally.completed += 1,
                TrackStatus::Failed => tally.failed += 1,
                _ => {}
            }
            tally
        })
    }

    /// Sum of all outcome counts.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.completed + self.failed + self.cancelled
    }
}

/// Completion statistics exposed alongside the queue snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub is_complete: bool,
    pub is_cancelled: bool,
    pub completed_count: u32,
    pub failed_count: u32,
    pub cancelled_count: u32,
    pub total_count: u32,
    pub has_failures: bool,
    pub is_full_success: bool,
}

impl CompletionSummary {
    /// Summarize the counts the state currently holds.
    ///
    /// After an authoritative engine report these are the engine's numbers.
    #[must_use]
    pub const fn of(state: &QueueState) -> Self {
        Self::from_counts(
            state.completed_count,
            state.failed_count,
            state.cancelled_count,
            state.total_tracks,
            state.is_complete,
            state.is_cancelled,
        )
    }

    const fn from_counts(
        completed: u32,
        failed: u32,
        cancelled: u32,
        total: u32,
        is_complete: bool,
        is_cancelled: bool,
    ) -> Self {
        Self {
            is_complete,
            is_cancelled,
            completed_count: completed,
            failed_count: failed,
            cancelled_count: cancelled,
            total_count: total,
            has_failures: failed > 0,
            is_full_success: is_complete && !is_cancelled && failed == 0,
        }
    }
}

/// Recompute completion statistics from the track registry alone.
///
/// `cancelled_count` is only meaningful once the run is cancelled: it is the
/// remainder of tracks that reached neither `complete` nor `failed`.
#[must_use]
pub fn aggregate(state: &QueueState) -> CompletionSummary {
    let tally = Tally::of_registry(&state.tracks);
    let cancelled = if state.is_cancelled {
        state
            .total_tracks
            .saturating_sub(tally.completed + tally.failed)
    } else {
        0
    };

    CompletionSummary::from_counts(
        tally.completed,
        tally.failed,
        cancelled,
        state.total_tracks,
        state.is_complete,
        state.is_cancelled,
    )
}

/// A failed track with its error, for reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTrack {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub error: AppError,
}

/// Every failed track that carries an error, in queue order.
#[must_use]
pub fn failed_tracks(tracks: &[Track]) -> Vec<FailedTrack> {
    tracks
        .iter()
        .filter(|track| track.status == TrackStatus::Failed)
        .filter_map(|track| {
            track.error.as_ref().map(|error| FailedTrack {
                id: track.id.clone(),
                title: track.title.clone(),
                artist: track.artist.clone(),
                error: error.clone(),
            })
        })
        .collect()
}

/// Overall progress indicators for a progress bar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallProgress {
    pub total_count: u32,
    pub completed_count: u32,
    /// Completed share, rounded to the nearest whole percent.
    pub percentage: u32,
    pub has_active_track: bool,
    pub has_pending_track: bool,
    /// Something is waiting but nothing is running yet.
    pub show_preparing: bool,
    pub show_cancel_button: bool,
}

impl OverallProgress {
    /// Compute progress indicators from the registry.
    #[must_use]
    pub fn of(tracks: &[Track]) -> Self {
        let total_count = u32::try_from(tracks.len()).unwrap_or(u32::MAX);
        let completed_count = Tally::of_registry(tracks).completed;
        let has_active_track = tracks.iter().any(|t| t.status.is_active());
        let has_pending_track = tracks.iter().any(|t| t.status == TrackStatus::Pending);

        let percentage = if total_count > 0 {
            (completed_count * 100 + total_count / 2) / total_count
        } else {
            0
        };

        Self {
            total_count,
            completed_count,
            percentage,
            has_active_track,
            has_pending_track,
            show_preparing: !has_active_track && has_pending_track,
            show_cancel_button: has_active_track || has_pending_track,
        }
    }
}

//! Read-only queue snapshot for the presentation layer.
//!
//! UI safe: Clone + Debug + Serialize + Deserialize, derived entirely from a
//! [`QueueState`].

use serde::{Deserialize, Serialize};

use super::completion::{
    CompletionSummary, FailedTrack, OverallProgress, aggregate, failed_tracks,
};
use super::rate_limit::RateLimitStatus;
use super::state::QueueState;

/// Queue state plus the derived values rendered next to it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub state: QueueState,
    pub summary: CompletionSummary,
    pub progress: OverallProgress,
    pub rate_limit: RateLimitStatus,
    pub failed: Vec<FailedTrack>,
}

impl QueueSnapshot {
    /// Derive a snapshot from the current state.
    ///
    /// Counts come from the track registry until the engine's final report is
    /// applied; from then on they are the engine's numbers.
    #[must_use]
    pub fn of(state: &QueueState) -> Self {
        let summary = if state.engine_reconciled {
            CompletionSummary::of(state)
        } else {
            aggregate(state)
        };
        Self {
            summary,
            progress: OverallProgress::of(&state.tracks),
            rate_limit: RateLimitStatus::of(state),
            failed: failed_tracks(&state.tracks),
            state: state.clone(),
        }
    }

    /// Whether a run is in progress.
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.state.is_processing
    }

    /// Whether the last run has finished (completed or cancelled).
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.state.is_complete
    }
}

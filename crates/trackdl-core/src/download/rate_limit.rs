//! Rate-limit pause/resume sub-state.
//!
//! The engine owns retry and backoff. This module only reflects what the
//! engine reports: a rate-limit signal pauses the run on the current track,
//! a resume puts that track back to `downloading`, and exhaustion fails it with
//! `RATE_LIMITED` so the run can move on.
//!
//! While paused the run stays `is_processing`; nothing new is dispatched
//! because the current track is not terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::AppError;
use super::state::QueueState;
use super::track::TrackStatus;

/// Message used when the engine gives up without saying why.
pub const DEFAULT_EXHAUSTED_MESSAGE: &str = "Rate limit retries exhausted";

/// Read-only view of the pause sub-state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub is_rate_limited: bool,
    pub rate_limited_at: Option<DateTime<Utc>>,
}

impl RateLimitStatus {
    #[must_use]
    pub const fn of(state: &QueueState) -> Self {
        Self {
            is_rate_limited: state.is_rate_limited,
            rate_limited_at: state.rate_limited_at,
        }
    }
}

/// Pause on the current track.
///
/// A repeated signal keeps the original pause time. Returns `false` if the
/// current track cannot be rate limited from its status.
pub fn enter(state: &mut QueueState, now: DateTime<Utc>) -> bool {
    let Some(track) = state.current_track_mut() else {
        return false;
    };
    if !track.transition(TrackStatus::RateLimited, None) {
        return false;
    }
    if !state.is_rate_limited {
        state.is_rate_limited = true;
        state.rate_limited_at = Some(now);
    }
    true
}

/// The engine resumed the current track after a pause.
pub fn resume(state: &mut QueueState, percent: Option<f64>) -> bool {
    let Some(track) = state.current_track_mut() else {
        return false;
    };
    if track.status != TrackStatus::RateLimited
        || !track.transition(TrackStatus::Downloading, None)
    {
        return false;
    }
    track.percent = percent;
    clear(state);
    true
}

/// The engine gave up on the current track.
///
/// The track fails with `RATE_LIMITED` whatever code the engine attached,
/// keeping the engine's message when it sent one.
pub fn exhaust(state: &mut QueueState, error: Option<&AppError>) -> bool {
    let Some(track) = state.current_track_mut() else {
        return false;
    };
    if track.status != TrackStatus::RateLimited {
        return false;
    }
    let message = error.map_or(DEFAULT_EXHAUSTED_MESSAGE, |e| e.message.as_str());
    if !track.transition(TrackStatus::Failed, Some(AppError::rate_limited(message))) {
        return false;
    }
    clear(state);
    true
}

/// Drop the pause flags.
pub fn clear(state: &mut QueueState) {
    state.is_rate_limited = false;
    state.rate_limited_at = None;
}

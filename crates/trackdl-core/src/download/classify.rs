//! Failure classification for reporting.
//!
//! Maps an [`AppError`] to the bucket a failure report groups it under. The
//! rules are checked in a fixed order and the first match wins:
//!
//! 1. `GEO_BLOCKED` → [`FailureCategory::GeoBlocked`]
//! 2. `NETWORK_ERROR` → [`FailureCategory::Network`]
//! 3. `DOWNLOAD_FAILED` whose message mentions "unavailable", "private" or
//!    "removed" (any case) → [`FailureCategory::Unavailable`]
//! 4. anything else → [`FailureCategory::Other`]
//!
//! Classification never influences sequencing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::completion::FailedTrack;
use super::errors::{AppError, ErrorCode};

/// Message fragments that mark a `DOWNLOAD_FAILED` track as unavailable.
const UNAVAILABLE_MARKERS: [&str; 3] = ["unavailable", "private", "removed"];

/// Reporting bucket for a failed track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    GeoBlocked,
    Unavailable,
    Network,
    Other,
}

impl FailureCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GeoBlocked => "geo_blocked",
            Self::Unavailable => "unavailable",
            Self::Network => "network",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a failure.
#[must_use]
pub fn classify(error: &AppError) -> FailureCategory {
    match error.code {
        ErrorCode::GeoBlocked => FailureCategory::GeoBlocked,
        ErrorCode::NetworkError => FailureCategory::Network,
        ErrorCode::DownloadFailed if mentions_unavailable(&error.message) => {
            FailureCategory::Unavailable
        }
        _ => FailureCategory::Other,
    }
}

fn mentions_unavailable(message: &str) -> bool {
    let lower = message.to_lowercase();
    UNAVAILABLE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Group failed tracks by category.
///
/// Categories appear in the order their first track was seen; tracks keep
/// their relative order within a category.
#[must_use]
pub fn group_failures_by_reason(
    failed: &[FailedTrack],
) -> IndexMap<FailureCategory, Vec<FailedTrack>> {
    let mut groups: IndexMap<FailureCategory, Vec<FailedTrack>> = IndexMap::new();
    for track in failed {
        groups
            .entry(classify(&track.error))
            .or_default()
            .push(track.clone());
    }
    groups
}

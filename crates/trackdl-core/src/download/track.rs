//! Track registry entities.
//!
//! A [`Track`] is one downloadable unit in a queue run. Its [`TrackStatus`]
//! follows a monotone transition graph: once a track leaves `pending` it never
//! returns there, and `complete`/`failed` are final.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::AppError;

/// Opaque, stable track identifier (unique within one queue run).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Create a new track ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Status of a track within a queue run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    /// Waiting to be dispatched.
    Pending,
    /// Dispatched; the engine is fetching it.
    Downloading,
    /// The engine is transcoding it.
    Converting,
    /// Finished successfully.
    Complete,
    /// Finished with an error.
    Failed,
    /// Paused by the engine after a rate-limit response.
    RateLimited,
}

impl TrackStatus {
    /// Wire/display representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Converting => "converting",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::RateLimited => "rate_limited",
        }
    }

    /// `complete` and `failed` admit no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// The engine is actively working on the track.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Downloading | Self::Converting)
    }

    /// Whether `self -> next` is an edge of the status graph.
    ///
    /// Same-status edges on in-flight states are progress refreshes.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        use TrackStatus::{Complete, Converting, Downloading, Failed, Pending, RateLimited};

        matches!(
            (*self, next),
            (Pending, Downloading)
                | (
                    Downloading,
                    Downloading | Converting | Complete | Failed | RateLimited
                )
                | (Converting, Converting | Complete | Failed | RateLimited)
                | (RateLimited, RateLimited | Downloading | Failed)
        )
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata used to seed the registry when a run starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSeed {
    /// Stable identifier.
    pub id: TrackId,
    /// Display title.
    pub title: String,
    /// Display artist.
    pub artist: String,
    /// Artwork URL, if the source has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
}

impl TrackSeed {
    /// Create a seed without artwork.
    pub fn new(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            artwork_url: None,
        }
    }

    /// Attach an artwork URL.
    #[must_use]
    pub fn with_artwork(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = Some(url.into());
        self
    }
}

/// One track in the registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    pub status: TrackStatus,
    /// Present only while `status == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AppError>,
    /// Last reported progress for the in-flight phase (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

impl Track {
    /// A fresh `pending` track.
    #[must_use]
    pub fn pending(seed: TrackSeed) -> Self {
        Self {
            id: seed.id,
            title: seed.title,
            artist: seed.artist,
            artwork_url: seed.artwork_url,
            status: TrackStatus::Pending,
            error: None,
            percent: None,
        }
    }

    /// Strip run-specific state back to the seed metadata.
    #[must_use]
    pub fn to_seed(&self) -> TrackSeed {
        TrackSeed {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            artwork_url: self.artwork_url.clone(),
        }
    }

    /// Move to `next` if the edge exists. Returns whether the status changed.
    ///
    /// The error is kept only for `failed`; every other status clears it.
    pub fn transition(&mut self, next: TrackStatus, error: Option<AppError>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.error = if next == TrackStatus::Failed {
            error
        } else {
            None
        };
        if next.is_terminal() {
            self.percent = None;
        }
        true
    }
}

//! Inbound download engine events.
//!
//! The engine delivers four kinds of notification, each exactly once per
//! occurrence but with no ordering guarantee relative to the orchestrator's own
//! bookkeeping. [`EngineEvent`] is the single typed message the controller
//! consumes; the payload structs mirror the engine's wire shapes.

use serde::{Deserialize, Serialize};

use super::errors::AppError;
use super::track::{TrackId, TrackStatus};

/// Per-track status update (`download-progress`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub track_id: TrackId,
    pub status: TrackStatus,
    /// Progress of the current phase (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AppError>,
}

impl ProgressEvent {
    /// Create a status update with no percent or error.
    pub fn new(track_id: impl Into<TrackId>, status: TrackStatus) -> Self {
        Self {
            track_id: track_id.into(),
            status,
            percent: None,
            error: None,
        }
    }

    /// Create a `failed` update carrying the error.
    pub fn failed(track_id: impl Into<TrackId>, error: AppError) -> Self {
        Self::new(track_id, TrackStatus::Failed).with_error(error)
    }

    /// Set the progress percent.
    #[must_use]
    pub const fn with_percent(mut self, percent: f64) -> Self {
        self.percent = Some(percent);
        self
    }

    /// Set the error.
    #[must_use]
    pub fn with_error(mut self, error: AppError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Advisory queue position (`queue-progress`). `current` is 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueProgressEvent {
    pub current: u32,
    pub total: u32,
    pub track_id: TrackId,
}

/// Authoritative final counts of a finished run (`queue-complete`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCompleteEvent {
    pub completed: u32,
    pub failed: u32,
    pub total: u32,
    /// `(track_id, error_message)` for every failed track.
    #[serde(default)]
    pub failed_tracks: Vec<(TrackId, String)>,
}

/// Authoritative final counts of a cancelled run (`queue-cancelled`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCancelledEvent {
    pub completed: u32,
    pub cancelled: u32,
    pub total: u32,
}

/// Discriminated union of everything the engine can report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    Progress(ProgressEvent),
    QueueProgress(QueueProgressEvent),
    QueueComplete(QueueCompleteEvent),
    QueueCancelled(QueueCancelledEvent),
}

impl EngineEvent {
    /// Channel name used by the engine's transport.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Progress(_) => "download-progress",
            Self::QueueProgress(_) => "queue-progress",
            Self::QueueComplete(_) => "queue-complete",
            Self::QueueCancelled(_) => "queue-cancelled",
        }
    }

    /// Track the event refers to, for per-track events.
    #[must_use]
    pub const fn track_id(&self) -> Option<&TrackId> {
        match self {
            Self::Progress(event) => Some(&event.track_id),
            Self::QueueProgress(event) => Some(&event.track_id),
            Self::QueueComplete(_) | Self::QueueCancelled(_) => None,
        }
    }
}

impl From<ProgressEvent> for EngineEvent {
    fn from(event: ProgressEvent) -> Self {
        Self::Progress(event)
    }
}

impl From<QueueProgressEvent> for EngineEvent {
    fn from(event: QueueProgressEvent) -> Self {
        Self::QueueProgress(event)
    }
}

impl From<QueueCompleteEvent> for EngineEvent {
    fn from(event: QueueCompleteEvent) -> Self {
        Self::QueueComplete(event)
    }
}

impl From<QueueCancelledEvent> for EngineEvent {
    fn from(event: QueueCancelledEvent) -> Self {
        Self::QueueCancelled(event)
    }
}

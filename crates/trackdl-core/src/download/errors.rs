//! Error types for the download queue.
//!
//! [`AppError`] is the per-track failure reported by the download engine. It is
//! never fatal to the queue. [`QueueError`] is returned by queue operations that
//! are refused (wrong state, bad input) or cannot reach the controller.
//!
//! Both are serializable so they can cross into a presentation layer unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::track::TrackId;

/// Engine-reported failure code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidUrl,
    GeoBlocked,
    RateLimited,
    NetworkError,
    DownloadFailed,
    ConversionFailed,
}

impl ErrorCode {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "INVALID_URL",
            Self::GeoBlocked => "GEO_BLOCKED",
            Self::RateLimited => "RATE_LIMITED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::DownloadFailed => "DOWNLOAD_FAILED",
            Self::ConversionFailed => "CONVERSION_FAILED",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INVALID_URL" => Some(Self::InvalidUrl),
            "GEO_BLOCKED" => Some(Self::GeoBlocked),
            "RATE_LIMITED" => Some(Self::RateLimited),
            "NETWORK_ERROR" => Some(Self::NetworkError),
            "DOWNLOAD_FAILED" => Some(Self::DownloadFailed),
            "CONVERSION_FAILED" => Some(Self::ConversionFailed),
            _ => None,
        }
    }

    /// How loudly the presentation layer should surface this code.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::GeoBlocked | Self::RateLimited => Severity::Warning,
            Self::InvalidUrl | Self::NetworkError | Self::DownloadFailed | Self::ConversionFailed => {
                Severity::Error
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display severity of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A classified per-track failure.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
}

impl AppError {
    /// Create an error with the given code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a `RATE_LIMITED` error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    /// Create a `DOWNLOAD_FAILED` error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DownloadFailed, message)
    }

    /// Create a `NETWORK_ERROR` error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    /// Check whether this is a rate-limit report.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.code == ErrorCode::RateLimited
    }
}

/// Error returned by queue operations.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueError {
    /// The operation is not allowed in the current queue state.
    #[error("Cannot {operation}: {reason}")]
    InvalidState {
        /// The refused operation (e.g., "start", "reset").
        operation: String,
        /// Why it was refused.
        reason: String,
    },

    /// A run was started with no tracks.
    #[error("Queue has no tracks")]
    EmptyQueue,

    /// The same track ID appears twice in one run.
    #[error("Duplicate track: {id}")]
    DuplicateTrack {
        /// The repeated ID.
        id: TrackId,
    },

    /// A retry was requested but the last run has no failed tracks.
    #[error("No failed tracks to retry")]
    NothingToRetry,

    /// A single-track retry named a track that is absent or not failed.
    #[error("Track {id} is not a failed track of the last run")]
    NotFailed {
        /// The requested ID.
        id: TrackId,
    },

    /// The controller task is gone.
    #[error("Queue controller is not running")]
    ControllerClosed,
}

impl QueueError {
    /// Create an invalid-state error.
    pub fn invalid_state(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-state error for an operation refused mid-run.
    pub fn busy(operation: impl Into<String>) -> Self {
        Self::invalid_state(operation, "a queue is currently processing")
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidState { operation, .. } => {
                format!("Cannot {operation} while a download is in progress.")
            }
            Self::EmptyQueue => "There is nothing to download.".to_string(),
            Self::DuplicateTrack { id } => format!("Track '{id}' appears more than once."),
            Self::NothingToRetry => "No failed tracks to retry.".to_string(),
            Self::NotFailed { id } => format!("Track '{id}' did not fail and cannot be retried."),
            Self::ControllerClosed => "The download queue has stopped.".to_string(),
        }
    }
}

/// Convenience result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

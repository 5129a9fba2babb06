//! Download engine port.
//!
//! The engine performs the network fetch and transcode. The queue only submits
//! one track at a time and asks it to cancel; everything else the engine has to
//! say arrives as [`EngineEvent`]s through an [`EngineEventSink`].
//!
//! # Design
//!
//! - Retry and backoff belong to the engine
//! - A hung `download_track` is treated as still in flight; no timeouts here

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::download::{AppError, EngineEvent, TrackId};

/// Everything the engine needs to fetch and tag one track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDownloadRequest {
    pub track_url: String,
    pub track_id: TrackId,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// 1-based position, only set for multi-track runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    /// Run size, only set for multi-track runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tracks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

/// Why a dispatch did not produce a file.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The engine gave up on the track.
    #[error("{0}")]
    Failed(AppError),

    /// The engine stopped the track because the queue was cancelled.
    #[error("Download cancelled")]
    Cancelled,
}

impl From<AppError> for DispatchError {
    fn from(error: AppError) -> Self {
        Self::Failed(error)
    }
}

/// Port for the external download engine.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Download one track. Resolves with the written file.
    async fn download_track(&self, request: TrackDownloadRequest)
    -> Result<PathBuf, DispatchError>;

    /// Ask the engine to stop the queue it is working on.
    async fn cancel_queue(&self) -> Result<(), AppError>;
}

/// Where the engine delivers its events.
///
/// Implementations must not block.
pub trait EngineEventSink: Send + Sync {
    fn deliver(&self, event: EngineEvent);
}

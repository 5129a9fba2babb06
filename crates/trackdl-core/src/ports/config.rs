//! Queue configuration and run requests.

use std::path::PathBuf;

use crate::download::{QueueError, QueueResult, TrackId, TrackSeed};

/// Default base the engine resolves `<base>/<track id>` against.
pub const DEFAULT_TRACK_URL_BASE: &str = "https://api.soundcloud.com/tracks";

/// Default capacity of the controller's command channel.
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Configuration for creating a queue controller.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Base URL a track id is appended to.
    pub track_url_base: String,
    /// Output directory used when a run does not name one.
    pub output_dir: Option<PathBuf>,
    /// Capacity of the command channel.
    pub command_buffer: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            track_url_base: DEFAULT_TRACK_URL_BASE.to_string(),
            output_dir: None,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the track URL base. A trailing slash is dropped.
    #[must_use]
    pub fn with_track_url_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.track_url_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Set the default output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set the channel capacity (at least 1).
    #[must_use]
    pub fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity.max(1);
        self
    }

    /// URL the engine downloads `id` from.
    #[must_use]
    pub fn track_url(&self, id: &TrackId) -> String {
        format!("{}/{}", self.track_url_base, id)
    }
}

/// Request to start a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    pub tracks: Vec<TrackSeed>,
    /// Album tag applied to every track.
    pub album_name: Option<String>,
    /// Overrides [`QueueConfig::output_dir`] for this run.
    pub output_dir: Option<PathBuf>,
}

impl StartRequest {
    #[must_use]
    pub fn new(tracks: Vec<TrackSeed>) -> Self {
        Self {
            tracks,
            ..Self::default()
        }
    }

    /// Set the album name.
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album_name = Some(album.into());
        self
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Check the track list: non-empty, no repeated ids.
    pub fn validate(&self) -> QueueResult<()> {
        if self.tracks.is_empty() {
            return Err(QueueError::EmptyQueue);
        }
        let mut seen = std::collections::HashSet::with_capacity(self.tracks.len());
        for seed in &self.tracks {
            if !seen.insert(&seed.id) {
                return Err(QueueError::DuplicateTrack {
                    id: seed.id.clone(),
                });
            }
        }
        Ok(())
    }
}

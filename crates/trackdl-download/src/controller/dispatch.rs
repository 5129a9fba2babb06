//! Building engine requests and turning their results into events.

use std::path::PathBuf;

use trackdl_core::download::{EngineEvent, ProgressEvent, QueueState, TrackStatus};
use trackdl_core::ports::{DispatchError, QueueConfig, TrackDownloadRequest};

/// Request for the track at `current_index`.
///
/// `track_number`/`total_tracks` are only set for multi-track runs.
pub(crate) fn build_request(
    config: &QueueConfig,
    state: &QueueState,
) -> Option<TrackDownloadRequest> {
    let track = state.current_track()?;
    let multi = state.total_tracks > 1;
    let position = u32::try_from(state.current_index + 1).unwrap_or(u32::MAX);

    Some(TrackDownloadRequest {
        track_url: config.track_url(&track.id),
        track_id: track.id.clone(),
        title: track.title.clone(),
        artist: track.artist.clone(),
        album: state.album_name.clone(),
        track_number: multi.then_some(position),
        total_tracks: multi.then_some(state.total_tracks),
        artwork_url: track.artwork_url.clone(),
        output_dir: state.output_dir.clone(),
    })
}

/// The events a resolved dispatch stands for. `Cancelled` stands for nothing.
///
/// A finished download settles the track even if the engine's resume report
/// never arrived, so a paused track is resumed before it completes.
pub(crate) fn result_events(
    state: &QueueState,
    index: usize,
    result: Result<PathBuf, DispatchError>,
) -> Vec<EngineEvent> {
    let Some(track) = state.tracks.get(index) else {
        return Vec::new();
    };
    let id = track.id.clone();
    match result {
        Ok(_) if track.status == TrackStatus::RateLimited => vec![
            ProgressEvent::new(id.clone(), TrackStatus::Downloading).into(),
            ProgressEvent::new(id, TrackStatus::Complete).into(),
        ],
        Ok(_) => vec![ProgressEvent::new(id, TrackStatus::Complete).into()],
        Err(DispatchError::Failed(error)) => vec![ProgressEvent::failed(id, error).into()],
        Err(DispatchError::Cancelled) => Vec::new(),
    }
}

//! Core domain types and ports for the track download queue.
//!
//! Pure and synchronous: the queue state, the reducers that apply engine events
//! to it, completion statistics and failure classification, plus the traits the
//! controller and the download engine meet at.
#![deny(unused_crate_dependencies)]

pub mod download;
pub mod ports;

pub use download::{
    AppError, CompletionSummary, ConsistencyFault, EngineEvent, ErrorCode, FailedTrack,
    FailureCategory, Ignored, OverallProgress, Outcome, ProgressEvent, QueueCancelledEvent,
    QueueCompleteEvent, QueueError, QueueProgressEvent, QueueResult, QueueSnapshot, QueueState,
    RateLimitStatus, Reconciled, Severity, Tally, Track, TrackId, TrackSeed, TrackStatus,
    aggregate, apply, classify, failed_tracks, group_failures_by_reason,
};
pub use ports::{
    DispatchError, DownloadEngine, EngineEventSink, QueueConfig, QueuePort, StartRequest,
    TrackDownloadRequest,
};

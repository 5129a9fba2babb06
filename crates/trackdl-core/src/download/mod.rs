//! Download queue domain: tracks, engine events, errors and the pure reducers
//! that turn engine reports into queue state.
//!
//! No I/O, no async runtime, no logging. The controller in `trackdl-download`
//! owns the single writable [`QueueState`] and calls into this module.
//!
//! # Structure
//!
//! - `track` - Track registry entries and the status graph
//! - `errors` - Engine error codes and queue operation errors
//! - `events` - Inbound engine events
//! - `state` - The authoritative queue snapshot
//! - `reconcile` - `apply(state, event) -> state'`
//! - `rate_limit` - Pause/resume sub-state
//! - `completion` - Derived counts and progress
//! - `classify` - Failure buckets for reporting
//! - `snapshot` - Read-only view for the presentation layer

pub mod classify;
pub mod completion;
pub mod errors;
pub mod events;
pub mod rate_limit;
pub mod reconcile;
pub mod snapshot;
pub mod state;
pub mod track;

pub use classify::{FailureCategory, classify, group_failures_by_reason};
pub use completion::{
    CompletionSummary, FailedTrack, OverallProgress, Tally, aggregate, failed_tracks,
};
pub use errors::{AppError, ErrorCode, QueueError, QueueResult, Severity};
pub use events::{
    EngineEvent, ProgressEvent, QueueCancelledEvent, QueueCompleteEvent, QueueProgressEvent,
};
pub use rate_limit::RateLimitStatus;
pub use reconcile::{Ignored, Outcome, Reconciled, apply};
pub use snapshot::QueueSnapshot;
pub use state::{ConsistencyFault, QueueState};
pub use track::{Track, TrackId, TrackSeed, TrackStatus};

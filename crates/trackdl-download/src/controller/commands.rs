//! Messages the controller consumes.

use std::path::PathBuf;

use tokio::sync::oneshot;
use uuid::Uuid;

use trackdl_core::download::{EngineEvent, QueueResult, TrackId};
use trackdl_core::ports::{DispatchError, StartRequest};

pub(crate) type Reply = oneshot::Sender<QueueResult<()>>;

/// Requests from a [`QueueHandle`](super::QueueHandle).
pub(crate) enum Command {
    Start { request: StartRequest, reply: Reply },
    Cancel { reply: Reply },
    Reset { reply: Reply },
    RetryFailed { reply: Reply },
    RetryTrack { id: TrackId, reply: Reply },
}

impl Command {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Cancel { .. } => "cancel",
            Self::Reset { .. } => "reset",
            Self::RetryFailed { .. } => "retry_failed",
            Self::RetryTrack { .. } => "retry_track",
        }
    }
}

/// Identity of one outstanding engine request.
///
/// A result is only applied if its lease still matches the in-flight slot and
/// the run it was issued for is the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DispatchLease {
    pub(crate) run_id: Uuid,
    pub(crate) index: usize,
}

/// Engine reports and dispatch results, in the order they happened.
pub(crate) enum Inbound {
    Engine(EngineEvent),
    DispatchFinished {
        lease: DispatchLease,
        result: Result<PathBuf, DispatchError>,
    },
}

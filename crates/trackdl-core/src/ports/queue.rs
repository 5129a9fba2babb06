//! Queue port: what the presentation layer can ask of the download queue.
//!
//! # Usage
//!
//! ```ignore
//! let queue: Arc<dyn QueuePort> = /* ... */;
//!
//! queue.start(StartRequest::new(seeds).with_album("Live")).await?;
//! let snapshot = queue.snapshot();
//! queue.cancel().await?;
//! ```

use async_trait::async_trait;

use super::config::StartRequest;
use crate::download::{QueueResult, QueueSnapshot, TrackId};

/// Port for driving a download queue.
#[async_trait]
pub trait QueuePort: Send + Sync {
    /// Start a run and dispatch its first track.
    ///
    /// Refused with `InvalidState` while another run is processing.
    async fn start(&self, request: StartRequest) -> QueueResult<()>;

    /// Record cancellation intent and ask the engine to stop.
    ///
    /// Idempotent. A no-op when nothing is processing.
    async fn cancel(&self) -> QueueResult<()>;

    /// Return to the initial state. Refused while processing; idempotent.
    async fn reset_queue(&self) -> QueueResult<()>;

    /// Start a fresh run with the failed tracks of the last run.
    async fn retry_failed(&self) -> QueueResult<()>;

    /// Start a fresh run with one failed track of the last run.
    async fn retry_track(&self, id: TrackId) -> QueueResult<()>;

    /// Latest published snapshot.
    fn snapshot(&self) -> QueueSnapshot;
}

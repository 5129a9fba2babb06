//! Queue controller for trackdl.
//!
//! Drives a run of tracks through a [`DownloadEngine`] one at a time, applies
//! the engine's reports with the reducers in `trackdl-core`, and publishes
//! read-only [`QueueSnapshot`]s.
//!
//! # Usage
//!
//! ```ignore
//! let events = EngineEventChannel::new();
//! let engine: Arc<dyn DownloadEngine> = Arc::new(MyEngine::new(events.sink()));
//! let queue = spawn_queue_controller(engine, events, QueueConfig::default());
//!
//! queue.start(StartRequest::new(seeds)).await?;
//! let mut updates = queue.subscribe();
//! updates.wait_for(|s| s.is_finished()).await?;
//! ```

// Re-export core types for convenience
pub use trackdl_core::download::{
    CompletionSummary, EngineEvent, QueueError, QueueResult, QueueSnapshot, QueueState,
};
pub use trackdl_core::ports::{
    DispatchError, DownloadEngine, EngineEventSink, QueueConfig, QueuePort, StartRequest,
    TrackDownloadRequest,
};

mod controller;

pub use controller::{ChannelEventSink, EngineEventChannel, QueueHandle, spawn_queue_controller};

//! Port definitions for the systems around the queue.
//!
//! # Design Rules
//!
//! - Only core download types in signatures
//! - No runtime or transport types leak through

pub mod config;
pub mod engine;
pub mod queue;

pub use config::{DEFAULT_COMMAND_BUFFER, DEFAULT_TRACK_URL_BASE, QueueConfig, StartRequest};
pub use engine::{DispatchError, DownloadEngine, EngineEventSink, TrackDownloadRequest};
pub use queue::QueuePort;

//! Shared test doubles for controller integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, oneshot, watch};

use trackdl_core::download::{AppError, QueueSnapshot, TrackSeed};
use trackdl_core::ports::{DispatchError, DownloadEngine, TrackDownloadRequest};
use trackdl_download::{EngineEventChannel, QueueConfig, QueueHandle, spawn_queue_controller};

pub const WAIT: Duration = Duration::from_secs(5);

/// One engine request the test has to resolve.
pub struct PendingDispatch {
    pub request: TrackDownloadRequest,
    reply: oneshot::Sender<Result<PathBuf, DispatchError>>,
}

impl PendingDispatch {
    pub fn track_id(&self) -> &str {
        self.request.track_id.as_str()
    }

    pub fn complete(self) {
        let path = PathBuf::from(format!("/music/{}.mp3", self.request.track_id));
        let _ = self.reply.send(Ok(path));
    }

    pub fn fail(self, error: AppError) {
        let _ = self.reply.send(Err(DispatchError::Failed(error)));
    }

    pub fn cancelled(self) {
        let _ = self.reply.send(Err(DispatchError::Cancelled));
    }
}

/// Engine whose requests stay outstanding until the test resolves them.
pub struct ManualEngine {
    dispatched: mpsc::UnboundedSender<PendingDispatch>,
    cancels: AtomicUsize,
}

impl ManualEngine {
    pub fn cancel_calls(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownloadEngine for ManualEngine {
    async fn download_track(
        &self,
        request: TrackDownloadRequest,
    ) -> Result<PathBuf, DispatchError> {
        let (reply, response) = oneshot::channel();
        let _ = self.dispatched.send(PendingDispatch { request, reply });
        response.await.unwrap_or(Err(DispatchError::Cancelled))
    }

    async fn cancel_queue(&self) -> Result<(), AppError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A controller wired to a [`ManualEngine`].
pub struct Harness {
    pub queue: QueueHandle,
    pub engine: Arc<ManualEngine>,
    dispatches: Mutex<mpsc::UnboundedReceiver<PendingDispatch>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(ManualEngine {
            dispatched: tx,
            cancels: AtomicUsize::new(0),
        });
        let queue = spawn_queue_controller(engine.clone(), EngineEventChannel::new(), config);
        Self {
            queue,
            engine,
            dispatches: Mutex::new(rx),
        }
    }

    /// Wait for the next engine request.
    pub async fn next_dispatch(&self) -> PendingDispatch {
        let mut rx = self.dispatches.lock().await;
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for a dispatch")
            .expect("engine dropped")
    }

    /// Assert no engine request is outstanding beyond those already taken.
    pub async fn assert_no_dispatch(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut rx = self.dispatches.lock().await;
        assert!(rx.try_recv().is_err(), "unexpected dispatch");
    }

    /// Wait until the engine has been asked to cancel `n` times.
    pub async fn wait_for_cancel_calls(&self, n: usize) {
        tokio::time::timeout(WAIT, async {
            while self.engine.cancel_calls() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for engine cancel");
    }

    /// Wait until a snapshot satisfies `predicate`.
    pub async fn wait_for(&self, predicate: impl FnMut(&QueueSnapshot) -> bool) -> QueueSnapshot {
        wait_for(self.queue.subscribe(), predicate).await
    }
}

pub async fn wait_for(
    mut rx: watch::Receiver<QueueSnapshot>,
    predicate: impl FnMut(&QueueSnapshot) -> bool,
) -> QueueSnapshot {
    tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("controller stopped")
        .clone()
}

/// `n` seeds with ids `t0..t{n-1}`.
pub fn seeds(n: usize) -> Vec<TrackSeed> {
    (0..n)
        .map(|i| TrackSeed::new(format!("t{i}"), format!("Track {i}"), "Artist"))
        .collect()
}

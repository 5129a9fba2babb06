//! Client side of the controller: the queue handle and the engine event sink.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};

use trackdl_core::download::{EngineEvent, QueueError, QueueResult, QueueSnapshot, TrackId};
use trackdl_core::ports::{EngineEventSink, QueuePort, StartRequest};

use super::commands::{Command, Inbound, Reply};

/// Channel the engine reports into, created before the engine so it can be
/// handed a sink.
///
/// ```ignore
/// let events = EngineEventChannel::new();
/// let engine = Arc::new(MyEngine::new(events.sink()));
/// let queue = spawn_queue_controller(engine, events, QueueConfig::default());
/// ```
pub struct EngineEventChannel {
    tx: mpsc::UnboundedSender<Inbound>,
    rx: mpsc::UnboundedReceiver<Inbound>,
}

impl EngineEventChannel {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A sink delivering into this channel.
    #[must_use]
    pub fn sink(&self) -> ChannelEventSink {
        ChannelEventSink {
            tx: self.tx.clone(),
        }
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<Inbound>,
        mpsc::UnboundedReceiver<Inbound>,
    ) {
        (self.tx, self.rx)
    }
}

impl Default for EngineEventChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// [`EngineEventSink`] backed by the controller's inbound channel.
///
/// Never blocks; events sent after the controller stopped are dropped.
#[derive(Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl EngineEventSink for ChannelEventSink {
    fn deliver(&self, event: EngineEvent) {
        let name = event.event_name();
        if self.tx.send(Inbound::Engine(event)).is_err() {
            tracing::debug!(target: "trackdl.queue", event = name, "Controller gone; dropping event");
        }
    }
}

/// Cloneable handle to a running queue controller.
#[derive(Clone)]
pub struct QueueHandle {
    commands: mpsc::Sender<Command>,
    inbound: mpsc::UnboundedSender<Inbound>,
    snapshots: watch::Receiver<QueueSnapshot>,
}

impl QueueHandle {
    pub(crate) const fn new(
        commands: mpsc::Sender<Command>,
        inbound: mpsc::UnboundedSender<Inbound>,
        snapshots: watch::Receiver<QueueSnapshot>,
    ) -> Self {
        Self {
            commands,
            inbound,
            snapshots,
        }
    }

    /// Start a run over `request.tracks`.
    pub async fn start_request(&self, request: StartRequest) -> QueueResult<()> {
        self.request(|reply| Command::Start { request, reply }).await
    }

    /// Subscribe to snapshot updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.snapshots.clone()
    }

    /// Another sink into this controller.
    #[must_use]
    pub fn event_sink(&self) -> ChannelEventSink {
        ChannelEventSink {
            tx: self.inbound.clone(),
        }
    }

    async fn request<F>(&self, build: F) -> QueueResult<()>
    where
        F: FnOnce(Reply) -> Command,
    {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| QueueError::ControllerClosed)?;
        response.await.map_err(|_| QueueError::ControllerClosed)?
    }
}

#[async_trait]
impl QueuePort for QueueHandle {
    async fn start(&self, request: StartRequest) -> QueueResult<()> {
        self.start_request(request).await
    }

    async fn cancel(&self) -> QueueResult<()> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    async fn reset_queue(&self) -> QueueResult<()> {
        self.request(|reply| Command::Reset { reply }).await
    }

    async fn retry_failed(&self) -> QueueResult<()> {
        self.request(|reply| Command::RetryFailed { reply }).await
    }

    async fn retry_track(&self, id: TrackId) -> QueueResult<()> {
        self.request(|reply| Command::RetryTrack { id, reply }).await
    }

    fn snapshot(&self) -> QueueSnapshot {
        self.snapshots.borrow().clone()
    }
}

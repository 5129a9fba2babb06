//! Queue controller actor.
//!
//! The controller owns the only writable [`QueueState`]. Everything that can
//! change it arrives as a message: commands from [`QueueHandle`]s, engine
//! events from the [`ChannelEventSink`], and results of its own dispatches.
//! Each message is handled to completion before the next one is read, and
//! every change is published as a [`QueueSnapshot`] on a `watch` channel.
//!
//! # Concurrency Model
//!
//! - Single writer: the actor task
//! - Single flight: at most one engine request outstanding, tracked by a
//!   [`DispatchLease`]
//! - A result whose lease or run does not match is stale and dropped
//! - A run that finished before its `queue-complete` arrived still owes that
//!   report; the next final report is matched to it, not to a newer run
//! - Engine reports are drained before commands (`biased` select)
//! - Nothing here awaits the engine; dispatch and cancel run in spawned tasks

mod commands;
mod dispatch;
mod handle;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use trackdl_core::download::{
    EngineEvent, Outcome, QueueError, QueueResult, QueueSnapshot, QueueState, Reconciled, Track,
    TrackId, TrackSeed, TrackStatus, reconcile,
};
use trackdl_core::ports::{DispatchError, DownloadEngine, QueueConfig, StartRequest};

use commands::{Command, DispatchLease, Inbound};

pub use handle::{ChannelEventSink, EngineEventChannel, QueueHandle};

/// Spawn a controller on the current tokio runtime.
///
/// `events` is the channel the engine was given a sink for.
pub fn spawn_queue_controller(
    engine: Arc<dyn DownloadEngine>,
    events: EngineEventChannel,
    config: QueueConfig,
) -> QueueHandle {
    let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(QueueSnapshot::default());
    let (inbound_tx, inbound_rx) = events.into_parts();

    let controller = QueueController {
        engine,
        config,
        state: QueueState::default(),
        in_flight: None,
        unreported_runs: 0,
        inbound_tx: inbound_tx.clone(),
        snapshot_tx,
    };
    tokio::spawn(controller.run(command_rx, inbound_rx));

    QueueHandle::new(command_tx, inbound_tx, snapshot_rx)
}

struct QueueController {
    engine: Arc<dyn DownloadEngine>,
    config: QueueConfig,
    state: QueueState,
    /// The outstanding engine request, if any.
    in_flight: Option<DispatchLease>,
    /// Earlier runs that finished locally and still owe a final engine report.
    unreported_runs: u32,
    /// Where spawned dispatches report back.
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    snapshot_tx: watch::Sender<QueueSnapshot>,
}

impl QueueController {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut inbound: mpsc::UnboundedReceiver<Inbound>,
    ) {
        tracing::debug!(target: "trackdl.queue", "Queue controller started");
        loop {
            tokio::select! {
                biased;
                Some(message) = inbound.recv() => self.handle_inbound(message),
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }
        tracing::debug!(target: "trackdl.queue", "Queue controller stopped");
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(QueueSnapshot::of(&self.state));
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn handle_command(&mut self, command: Command) {
        let name = command.name();
        let (result, reply) = match command {
            Command::Start { request, reply } => (self.start(request), reply),
            Command::Cancel { reply } => (self.cancel(), reply),
            Command::Reset { reply } => (self.reset(), reply),
            Command::RetryFailed { reply } => (self.retry_failed(), reply),
            Command::RetryTrack { id, reply } => (self.retry_track(&id), reply),
        };
        if let Err(e) = &result {
            tracing::debug!(target: "trackdl.queue", command = name, error = %e, "Command refused");
        }
        self.publish();
        // The caller may have given up waiting.
        let _ = reply.send(result);
    }

    fn start(&mut self, request: StartRequest) -> QueueResult<()> {
        if self.state.is_processing {
            return Err(QueueError::busy("start"));
        }
        request.validate()?;

        let run_id = Uuid::new_v4();
        let output_dir = request.output_dir.or_else(|| self.config.output_dir.clone());
        self.retire_run();
        self.state = QueueState::begin(run_id, request.tracks, request.album_name, output_dir);

        tracing::info!(
            target: "trackdl.queue",
            run_id = %run_id,
            tracks = self.state.total_tracks,
            album = ?self.state.album_name,
            "Queue run STARTED"
        );
        self.pump();
        Ok(())
    }

    fn cancel(&mut self) -> QueueResult<()> {
        if !self.state.request_cancel() {
            tracing::debug!(
                target: "trackdl.queue",
                processing = self.state.is_processing,
                "Cancel has no effect"
            );
            return Ok(());
        }

        tracing::info!(
            target: "trackdl.queue",
            index = self.state.current_index,
            in_flight = self.in_flight.is_some(),
            "Cancel requested"
        );
        self.cancel_engine();
        Ok(())
    }

    fn cancel_engine(&self) {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            if let Err(e) = engine.cancel_queue().await {
                tracing::warn!(target: "trackdl.queue", error = %e, "Engine refused cancel");
            }
        });
    }

    fn reset(&mut self) -> QueueResult<()> {
        if self.state.is_processing {
            return Err(QueueError::busy("reset"));
        }
        if self.state.has_run() {
            tracing::info!(target: "trackdl.queue", "Queue reset");
        }
        self.retire_run();
        self.state = QueueState::default();
        Ok(())
    }

    /// Remember that the run being replaced still owes its final report.
    fn retire_run(&mut self) {
        if self.state.is_complete && !self.state.engine_reconciled {
            self.unreported_runs += 1;
            tracing::debug!(
                target: "trackdl.queue",
                run_id = ?self.state.run_id,
                owed = self.unreported_runs,
                "Replacing a run before its final engine report"
            );
        }
    }

    fn retry_failed(&mut self) -> QueueResult<()> {
        if self.state.is_processing {
            return Err(QueueError::busy("retry"));
        }
        let seeds: Vec<_> = self
            .state
            .tracks
            .iter()
            .filter(|track| track.status == TrackStatus::Failed)
            .map(Track::to_seed)
            .collect();
        if seeds.is_empty() {
            return Err(QueueError::NothingToRetry);
        }
        tracing::info!(target: "trackdl.queue", tracks = seeds.len(), "Retrying failed tracks");
        self.start(self.retry_request(seeds))
    }

    fn retry_track(&mut self, id: &TrackId) -> QueueResult<()> {
        if self.state.is_processing {
            return Err(QueueError::busy("retry"));
        }
        let seed = self
            .state
            .tracks
            .iter()
            .find(|track| &track.id == id && track.status == TrackStatus::Failed)
            .map(Track::to_seed)
            .ok_or_else(|| QueueError::NotFailed { id: id.clone() })?;
        tracing::info!(target: "trackdl.queue", track_id = %id, "Retrying track");
        self.start(self.retry_request(vec![seed]))
    }

    /// A new run over `seeds` with the last run's album and output directory.
    fn retry_request(&self, seeds: Vec<TrackSeed>) -> StartRequest {
        StartRequest {
            tracks: seeds,
            album_name: self.state.album_name.clone(),
            output_dir: self.state.output_dir.clone(),
        }
    }

    // =========================================================================
    // Engine reports and dispatch results
    // =========================================================================

    fn handle_inbound(&mut self, message: Inbound) {
        match message {
            Inbound::Engine(event) if self.owed_elsewhere(&event) => {}
            Inbound::Engine(event) => self.reconcile(&event),
            Inbound::DispatchFinished { lease, result } => self.finish_dispatch(lease, result),
        }
        self.pump();
        self.publish();
    }

    /// Whether `event` is the final report of an earlier run.
    fn owed_elsewhere(&mut self, event: &EngineEvent) -> bool {
        let is_final = matches!(
            event,
            EngineEvent::QueueComplete(_) | EngineEvent::QueueCancelled(_)
        );
        if !is_final || self.unreported_runs == 0 {
            return false;
        }
        self.unreported_runs -= 1;
        tracing::debug!(
            target: "trackdl.queue",
            event = event.event_name(),
            still_owed = self.unreported_runs,
            "Final report belongs to an earlier run; not applied"
        );
        true
    }

    fn reconcile(&mut self, event: &EngineEvent) {
        let state = std::mem::take(&mut self.state);
        let Reconciled { state, outcome } = reconcile::apply(state, event, Utc::now());
        self.state = state;
        self.log_outcome(event, &outcome);
    }

    fn finish_dispatch(&mut self, lease: DispatchLease, result: Result<PathBuf, DispatchError>) {
        if self.in_flight != Some(lease) {
            tracing::debug!(
                target: "trackdl.queue",
                index = lease.index,
                "Ignoring stale dispatch result (lease mismatch)"
            );
            return;
        }
        self.in_flight = None;

        if self.state.run_id != Some(lease.run_id) || self.state.current_index != lease.index {
            tracing::debug!(
                target: "trackdl.queue",
                run_id = %lease.run_id,
                index = lease.index,
                "Dropping dispatch result from a previous run"
            );
            return;
        }

        match &result {
            Ok(path) => tracing::debug!(
                target: "trackdl.queue",
                index = lease.index,
                path = %path.display(),
                "Dispatch resolved"
            ),
            Err(e) => tracing::debug!(
                target: "trackdl.queue",
                index = lease.index,
                error = %e,
                "Dispatch rejected"
            ),
        }
        if matches!(result, Err(DispatchError::Cancelled)) && self.state.request_cancel() {
            tracing::warn!(
                target: "trackdl.queue",
                index = lease.index,
                "Engine cancelled the download; cancelling the run"
            );
            self.cancel_engine();
        }
        for event in dispatch::result_events(&self.state, lease.index, result) {
            self.reconcile(&event);
        }
    }

    // =========================================================================
    // Sequencing
    // =========================================================================

    /// Dispatch or advance if the run allows it.
    ///
    /// Advancing needs a settled current track and no outstanding request.
    fn pump(&mut self) {
        if !self.state.is_processing || self.in_flight.is_some() {
            return;
        }
        let Some(status) = self.state.current_track().map(|track| track.status) else {
            return;
        };

        if self.state.is_cancelling {
            return;
        }
        match status {
            TrackStatus::Pending => self.dispatch(),
            TrackStatus::Complete | TrackStatus::Failed => self.advance(),
            TrackStatus::Downloading | TrackStatus::Converting | TrackStatus::RateLimited => {}
        }
    }

    fn advance(&mut self) {
        if self.state.step_forward() {
            tracing::info!(
                target: "trackdl.queue",
                index = self.state.current_index,
                total = self.state.total_tracks,
                "Advancing to next track"
            );
            self.dispatch();
        } else {
            self.state.finish();
            tracing::info!(
                target: "trackdl.queue",
                completed = self.state.completed_count,
                failed = self.state.failed_count,
                total = self.state.total_tracks,
                "Queue run COMPLETE"
            );
        }
    }

    fn dispatch(&mut self) {
        let Some(run_id) = self.state.run_id else {
            return;
        };
        let Some(request) = dispatch::build_request(&self.config, &self.state) else {
            return;
        };
        if !self.state.mark_dispatched() {
            return;
        }

        let lease = DispatchLease {
            run_id,
            index: self.state.current_index,
        };
        self.in_flight = Some(lease);
        tracing::info!(
            target: "trackdl.queue",
            track_id = %request.track_id,
            position = request.track_number,
            "Dispatching track"
        );

        let engine = Arc::clone(&self.engine);
        let reply = self.inbound_tx.clone();
        tokio::spawn(async move {
            let result = engine.download_track(request).await;
            // The controller is gone if this fails; nothing left to report to.
            let _ = reply.send(Inbound::DispatchFinished { lease, result });
        });
    }

    fn log_outcome(&self, event: &EngineEvent, outcome: &Outcome) {
        let name = event.event_name();
        match outcome {
            Outcome::Updated { track_id, status } => {
                tracing::trace!(target: "trackdl.queue", track_id = %track_id, status = %status, "Track progress");
            }
            Outcome::Settled { track_id, status } => {
                tracing::info!(target: "trackdl.queue", track_id = %track_id, status = %status, "Track finished");
            }
            Outcome::RateLimited { track_id } => {
                tracing::warn!(target: "trackdl.queue", track_id = %track_id, "Rate limited; queue paused");
            }
            Outcome::Resumed { track_id } => {
                tracing::info!(target: "trackdl.queue", track_id = %track_id, "Rate limit cleared; resuming");
            }
            Outcome::Advisory => {}
            Outcome::PositionMismatch {
                reported,
                expected,
                reported_track,
                expected_track,
            } => {
                tracing::warn!(
                    target: "trackdl.queue",
                    reported,
                    expected,
                    reported_track = %reported_track,
                    expected_track = ?expected_track,
                    "Engine queue position disagrees with controller"
                );
            }
            Outcome::Finalized { fault } | Outcome::Cancelled { fault } => {
                if let Some(fault) = fault {
                    tracing::error!(
                        target: "trackdl.queue",
                        event = name,
                        expected = ?fault.expected,
                        reported = ?fault.reported,
                        expected_total = fault.expected_total,
                        reported_total = fault.reported_total,
                        "Engine and queue disagree on outcome; using engine counts"
                    );
                }
                tracing::info!(
                    target: "trackdl.queue",
                    event = name,
                    completed = self.state.completed_count,
                    failed = self.state.failed_count,
                    cancelled = self.state.cancelled_count,
                    total = self.state.total_tracks,
                    "Queue run finalized by engine"
                );
            }
            Outcome::Ignored(why) => {
                tracing::debug!(
                    target: "trackdl.queue",
                    event = name,
                    track_id = ?event.track_id(),
                    reason = ?why,
                    "Ignoring engine event"
                );
            }
        }
    }
}

//! Scripted demo engine.
//!
//! Stands in for a real download engine: for each requested track it plays a
//! list of progress steps into the controller's event sink, then resolves the
//! request the way the script says. It reports `queue-progress`,
//! `queue-complete` and `queue-cancelled` the way a real engine would.
//!
//! Tracks the script does not mention download, convert and complete.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use trackdl_core::download::{
    AppError, EngineEvent, ProgressEvent, QueueCancelledEvent, QueueCompleteEvent,
    QueueProgressEvent, TrackId, TrackStatus,
};
use trackdl_core::ports::{DispatchError, DownloadEngine, EngineEventSink, TrackDownloadRequest};

/// One progress report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptStep {
    pub status: TrackStatus,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub error: Option<AppError>,
}

impl ScriptStep {
    const fn new(status: TrackStatus, percent: Option<f64>) -> Self {
        Self {
            status,
            percent,
            error: None,
        }
    }
}

/// How a scripted request resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptOutcome {
    #[default]
    Complete,
    Failed,
}

/// What the engine does for one track.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackScript {
    #[serde(default = "default_steps")]
    pub steps: Vec<ScriptStep>,
    #[serde(default)]
    pub outcome: ScriptOutcome,
    /// Error reported when `outcome` is `failed`.
    #[serde(default)]
    pub error: Option<AppError>,
}

impl TrackScript {
    /// The failure this track ends with, if it fails.
    fn failure(&self) -> Option<AppError> {
        match self.outcome {
            ScriptOutcome::Complete => None,
            ScriptOutcome::Failed => Some(
                self.error
                    .clone()
                    .unwrap_or_else(|| AppError::download_failed("Scripted failure")),
            ),
        }
    }
}

impl Default for TrackScript {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            outcome: ScriptOutcome::Complete,
            error: None,
        }
    }
}

fn default_steps() -> Vec<ScriptStep> {
    vec![
        ScriptStep::new(TrackStatus::Downloading, Some(0.5)),
        ScriptStep::new(TrackStatus::Downloading, Some(1.0)),
        ScriptStep::new(TrackStatus::Converting, None),
    ]
}

/// The whole engine script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Pause between steps.
    #[serde(default)]
    pub step_delay_ms: u64,
    #[serde(default)]
    pub tracks: HashMap<TrackId, TrackScript>,
}

impl Script {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Outcome counts the engine keeps for its own final reports.
#[derive(Debug, Default)]
struct RunTally {
    completed: u32,
    failed: u32,
    total: u32,
    failed_tracks: Vec<(TrackId, String)>,
}

/// [`DownloadEngine`] driven by a [`Script`].
pub struct ScriptedEngine<S> {
    script: Script,
    sink: S,
    cancelled: AtomicBool,
    tally: Mutex<RunTally>,
}

impl<S: EngineEventSink> ScriptedEngine<S> {
    pub fn new(script: Script, sink: S) -> Self {
        Self {
            script,
            sink,
            cancelled: AtomicBool::new(false),
            tally: Mutex::new(RunTally::default()),
        }
    }

    fn emit(&self, event: impl Into<EngineEvent>) {
        self.sink.deliver(event.into());
    }

    fn with_tally<T>(&self, f: impl FnOnce(&mut RunTally) -> T) -> T {
        // A poisoned tally only means another request panicked mid-update.
        let mut tally = self
            .tally
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut tally)
    }

    async fn pause(&self) {
        if self.script.step_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.script.step_delay_ms)).await;
        }
    }

    fn output_path(request: &TrackDownloadRequest) -> PathBuf {
        let dir = request.output_dir.as_deref().unwrap_or_else(|| Path::new("."));
        let name = format!("{} - {}.mp3", request.artist, request.title).replace('/', "_");
        dir.join(name)
    }

    /// Record a finished track; emit `queue-complete` after the last one.
    fn record(&self, request: &TrackDownloadRequest, failure: Option<&AppError>) {
        let report = self.with_tally(|tally| {
            match failure {
                Some(error) => {
                    tally.failed += 1;
                    tally
                        .failed_tracks
                        .push((request.track_id.clone(), error.message.clone()));
                }
                None => tally.completed += 1,
            }
            (tally.completed + tally.failed >= tally.total).then(|| QueueCompleteEvent {
                completed: tally.completed,
                failed: tally.failed,
                total: tally.total,
                failed_tracks: tally.failed_tracks.clone(),
            })
        });
        if let Some(report) = report {
            self.emit(report);
        }
    }
}

#[async_trait]
impl<S: EngineEventSink> DownloadEngine for ScriptedEngine<S> {
    async fn download_track(
        &self,
        request: TrackDownloadRequest,
    ) -> Result<PathBuf, DispatchError> {
        let position = request.track_number.unwrap_or(1);
        let total = request.total_tracks.unwrap_or(1);
        if position == 1 {
            self.cancelled.store(false, Ordering::SeqCst);
            self.with_tally(|tally| {
                *tally = RunTally {
                    total,
                    ..RunTally::default()
                };
            });
        }

        let id = request.track_id.clone();
        self.emit(QueueProgressEvent {
            current: position,
            total,
            track_id: id.clone(),
        });

        let script = self.script.tracks.get(&id).cloned().unwrap_or_default();
        let failure = script.failure();
        for step in script.steps {
            self.pause().await;
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(DispatchError::Cancelled);
            }
            let mut event = ProgressEvent::new(id.clone(), step.status);
            event.percent = step.percent;
            event.error = step.error;
            self.emit(event);
        }

        self.pause().await;
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(DispatchError::Cancelled);
        }
        match failure {
            None => {
                self.emit(ProgressEvent::new(id, TrackStatus::Complete));
                self.record(&request, None);
                Ok(Self::output_path(&request))
            }
            Some(error) => {
                self.emit(ProgressEvent::failed(id, error.clone()));
                self.record(&request, Some(&error));
                Err(DispatchError::Failed(error))
            }
        }
    }

    async fn cancel_queue(&self) -> Result<(), AppError> {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let report = self.with_tally(|tally| QueueCancelledEvent {
            completed: tally.completed,
            cancelled: tally.total.saturating_sub(tally.completed + tally.failed),
            total: tally.total,
        });
        self.emit(report);
        Ok(())
    }
}

//! `run` command: download a track list through the scripted engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use trackdl_core::download::{
    QueueSnapshot, TrackSeed, TrackStatus, group_failures_by_reason,
};
use trackdl_download::{
    EngineEventChannel, QueueConfig, QueueHandle, QueuePort, StartRequest, spawn_queue_controller,
};

use super::classify::severity_label;
use crate::error::CliError;
use crate::scripted::{Script, ScriptedEngine};

/// Arguments of the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub tracks: PathBuf,
    pub script: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub album: Option<String>,
    pub cancel_after: Option<u32>,
    pub json: bool,
}

pub async fn execute(options: RunOptions) -> Result<()> {
    let seeds = load_tracks(&options.tracks)?;
    let script = match &options.script {
        Some(path) => load_script(path)?,
        None => Script::default(),
    };

    let snapshot = run_queue(seeds, script, &options).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_summary(&snapshot);
    }
    Ok(())
}

/// Run the queue to its engine-confirmed end and return the final snapshot.
pub async fn run_queue(
    seeds: Vec<TrackSeed>,
    script: Script,
    options: &RunOptions,
) -> Result<QueueSnapshot> {
    let events = EngineEventChannel::new();
    let engine = Arc::new(ScriptedEngine::new(script, events.sink()));
    let config = QueueConfig::new().with_output_dir(options.output_dir.clone());
    let queue = spawn_queue_controller(engine, events, config);

    let mut request = StartRequest::new(seeds);
    if let Some(album) = &options.album {
        request = request.with_album(album.clone());
    }
    queue.start(request).await.map_err(CliError::from)?;

    follow(&queue, options.cancel_after, !options.json).await
}

/// Print track changes until the engine finalizes the run.
async fn follow(
    queue: &QueueHandle,
    cancel_after: Option<u32>,
    verbose_output: bool,
) -> Result<QueueSnapshot> {
    let mut updates = queue.subscribe();
    let mut last_seen: Option<(usize, TrackStatus)> = None;
    let mut cancel_sent = false;

    loop {
        let snapshot = updates.borrow_and_update().clone();
        let state = &snapshot.state;

        if let Some(track) = state.current_track() {
            let seen = Some((state.current_index, track.status));
            if verbose_output && seen != last_seen {
                println!(
                    "[{}/{}] {} - {}: {}",
                    state.current_index + 1,
                    state.total_tracks,
                    track.artist,
                    track.title,
                    track.status
                );
                last_seen = seen;
            }
        }

        if let Some(limit) = cancel_after {
            if !cancel_sent && state.is_processing && state.completed_count >= limit {
                tracing::debug!(completed = state.completed_count, "Cancelling run");
                queue.cancel().await.map_err(CliError::from)?;
                cancel_sent = true;
            }
        }

        if state.engine_reconciled {
            return Ok(snapshot);
        }
        updates
            .changed()
            .await
            .context("queue controller stopped before the run finished")?;
    }
}

fn load_tracks(path: &Path) -> Result<Vec<TrackSeed>> {
    let json = std::fs::read_to_string(path)
        .map_err(CliError::from)
        .with_context(|| format!("reading track list {}", path.display()))?;
    let seeds = serde_json::from_str(&json)
        .map_err(|e| CliError::Arguments(e.to_string()))
        .with_context(|| format!("parsing track list {}", path.display()))?;
    Ok(seeds)
}

fn load_script(path: &Path) -> Result<Script> {
    let json = std::fs::read_to_string(path)
        .map_err(CliError::from)
        .with_context(|| format!("reading engine script {}", path.display()))?;
    let script = Script::from_json(&json)
        .map_err(|e| CliError::Arguments(e.to_string()))
        .with_context(|| format!("parsing engine script {}", path.display()))?;
    Ok(script)
}

fn print_summary(snapshot: &QueueSnapshot) {
    let summary = &snapshot.summary;
    println!();
    if summary.is_cancelled {
        println!(
            "Cancelled: {} completed, {} failed, {} cancelled of {}",
            summary.completed_count,
            summary.failed_count,
            summary.cancelled_count,
            summary.total_count
        );
    } else if summary.is_full_success {
        println!("All {} tracks downloaded", summary.total_count);
    } else {
        println!(
            "Finished: {} completed, {} failed of {}",
            summary.completed_count, summary.failed_count, summary.total_count
        );
    }

    for (category, tracks) in group_failures_by_reason(&snapshot.failed) {
        println!("  {category}:");
        for track in tracks {
            println!(
                "    [{}] {} - {}: {}",
                severity_label(track.error.code.severity()),
                track.artist,
                track.title,
                track.error.message
            );
        }
    }

    if let Some(fault) = &snapshot.state.consistency_fault {
        eprintln!(
            "warning: engine reported {:?} for {} but the queue counted {:?}",
            fault.reported, fault.event, fault.expected
        );
    }
}

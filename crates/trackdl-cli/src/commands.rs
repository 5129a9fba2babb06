//! Available subcommands.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Download a list of tracks through the scripted demo engine
    Run {
        /// JSON file with `[{id, title, artist, artworkUrl?}]`
        #[arg(long)]
        tracks: PathBuf,
        /// JSON file scripting the engine's behavior per track
        #[arg(long)]
        script: Option<PathBuf>,
        /// Directory the engine writes into
        #[arg(long, env = "TRACKDL_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,
        /// Album tag applied to every track
        #[arg(long)]
        album: Option<String>,
        /// Cancel the run once this many tracks have completed
        #[arg(long, value_name = "N")]
        cancel_after: Option<u32>,
        /// Print the final snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how an engine error would be reported
    Classify {
        /// Error code (e.g. `GEO_BLOCKED`, `DOWNLOAD_FAILED`)
        #[arg(long)]
        code: String,
        /// Error message
        #[arg(long, default_value = "")]
        message: String,
    },
}

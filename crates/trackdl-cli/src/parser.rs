//! Root CLI structure and global options.

use clap::Parser;

use crate::commands::Commands;

/// Download tracks in order through a download engine.
#[derive(Parser)]
#[command(name = "trackdl")]
#[command(about = "Sequence track downloads and report the outcome")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

//! Command-line front end for the trackdl download queue.
//!
//! Wires a [`scripted::ScriptedEngine`] to the queue controller and prints
//! per-track progress and a final report.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod commands;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod parser;
pub mod scripted;

pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;

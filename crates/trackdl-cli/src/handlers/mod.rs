//! Command handlers.
//!
//! Handlers are thin: parse CLI input, drive the queue, format output for the
//! terminal. Sequencing and accounting live in `trackdl-download` and
//! `trackdl-core`.

pub mod classify;
pub mod run;

//! CLI-specific error types and exit codes.

use thiserror::Error;

use trackdl_core::download::QueueError;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// The queue refused an operation.
    #[error("{0}")]
    Queue(String),

    /// Argument or input file error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl CliError {
    /// Map error to an exit code (sysexits.h where one fits).
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Queue(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Io(_) => 74,       // EX_IOERR
        }
    }
}

impl From<QueueError> for CliError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::EmptyQueue | QueueError::DuplicateTrack { .. } => {
                Self::Arguments(err.user_message())
            }
            other => Self::Queue(other.user_message()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

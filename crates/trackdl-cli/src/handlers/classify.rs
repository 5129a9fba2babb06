//! `classify` command: show how an engine error would be reported.

use trackdl_core::download::{AppError, ErrorCode, FailureCategory, Severity, classify};

use crate::error::CliError;

/// Category and severity for an error code and message.
pub fn describe(code: &str, message: &str) -> Result<(FailureCategory, Severity), CliError> {
    let code = ErrorCode::parse(&code.trim().to_ascii_uppercase())
        .ok_or_else(|| CliError::Arguments(format!("unknown error code '{code}'")))?;
    let error = AppError::new(code, message);
    Ok((classify(&error), code.severity()))
}

pub fn execute(code: &str, message: &str) -> Result<(), CliError> {
    let (category, severity) = describe(code, message)?;
    println!("category: {category}");
    println!("severity: {}", severity_label(severity));
    Ok(())
}

pub(crate) const fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

//! Core error types.

use thiserror::Error;

/// Errors from the automaton engine.
///
/// Engine operations are total; the only failure is rebuilding an image
/// from raw fields that do not have the expected shape.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed snapshot field '{field}': {reason}")]
    MalformedSnapshot { field: &'static str, reason: String },
}

impl CoreError {
    /// Returns an error code suitable for protocol responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::MalformedSnapshot { .. } => "STORAGE_ERROR",
        }
    }
}

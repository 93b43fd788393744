//! Storage error types.

use crate::field::FieldKind;
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field key: {0:?}")]
    InvalidKey(String),

    #[error("field '{key}' holds {actual}, expected {expected}")]
    KindMismatch {
        key: String,
        expected: FieldKind,
        actual: FieldKind,
    },

    #[error("data corruption: {0}")]
    Corruption(String),

    #[error("core error: {0}")]
    Core(#[from] dfadev_core::CoreError),
}

//! Protocol error types and error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur during framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic bytes: expected 'DFAX', got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: u32 },

    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("invalid frame flags: {0:#x}")]
    InvalidFlags(u16),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,
}

/// Stable error codes returned in error responses.
///
/// These codes are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Protocol errors
    UnsupportedProtocol,
    BadRequest,

    // Device errors
    NotSupported,
    TransferFailed,

    // System errors
    StorageError,
    ShuttingDown,
    InternalError,
}

impl ErrorCode {
    /// Returns whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::StorageError | ErrorCode::InternalError)
    }

    /// Returns the wire name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnsupportedProtocol => "UNSUPPORTED_PROTOCOL",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotSupported => "NOT_SUPPORTED",
            ErrorCode::TransferFailed => "TRANSFER_FAILED",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::ShuttingDown => "SHUTTING_DOWN",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Server error types.

use dfadev_protocol::ErrorCode;
use thiserror::Error;

/// Errors from the character-device adapter.
///
/// Neither variant changes automaton state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("unsupported control code {request:#06x}")]
    UnsupportedOperation { request: u32 },

    #[error("control argument too short: needed {needed} bytes, got {got}")]
    TransferFailure { needed: usize, got: usize },
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] dfadev_protocol::ProtocolError),

    #[error("core error: {0}")]
    Core(#[from] dfadev_core::CoreError),

    #[error("storage error: {0}")]
    Storage(#[from] dfadev_store::StorageError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedProtocol(u16),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Converts to protocol error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ServerError::Io(_) => ErrorCode::InternalError,
            ServerError::Protocol(_) => ErrorCode::BadRequest,
            ServerError::Core(e) => match e.error_code() {
                "STORAGE_ERROR" => ErrorCode::StorageError,
                _ => ErrorCode::InternalError,
            },
            ServerError::Storage(_) => ErrorCode::StorageError,
            ServerError::Device(DeviceError::UnsupportedOperation { .. }) => {
                ErrorCode::NotSupported
            }
            ServerError::Device(DeviceError::TransferFailure { .. }) => ErrorCode::TransferFailed,
            ServerError::Json(_) => ErrorCode::BadRequest,
            ServerError::InvalidRequest(_) => ErrorCode::BadRequest,
            ServerError::UnsupportedProtocol(_) => ErrorCode::UnsupportedProtocol,
            ServerError::ShuttingDown => ErrorCode::ShuttingDown,
        }
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.error_code().is_retryable()
    }
}

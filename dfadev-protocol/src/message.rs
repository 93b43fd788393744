//! JSON message types for DCP requests and responses.

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// DCP operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    // Session management
    Hello,
    Ping,
    Bye,

    // Server info
    Info,

    // Device operations
    Read,
    Write,
    Ioctl,

    // Lifecycle
    PrepareUpdate,
}

impl Operation {
    /// Returns the wire name of this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Hello => "HELLO",
            Operation::Ping => "PING",
            Operation::Bye => "BYE",
            Operation::Info => "INFO",
            Operation::Read => "READ",
            Operation::Write => "WRITE",
            Operation::Ioctl => "IOCTL",
            Operation::PrepareUpdate => "PREPARE_UPDATE",
        }
    }
}

/// Request message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Message type, always "request".
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Unique request ID for correlation.
    pub id: String,

    /// Operation to perform.
    pub op: Operation,

    /// Operation-specific parameters.
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<String>, op: Operation) -> Self {
        Self {
            msg_type: "request".to_string(),
            id: id.into(),
            op,
            params: Value::Object(Default::default()),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Error details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    /// Stable error code.
    pub code: ErrorCode,

    /// Human-readable error message.
    pub message: String,

    /// Whether this error is retryable.
    pub retryable: bool,

    /// Additional error details.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, Value>,
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            retryable: code.is_retryable(),
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Response message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Message type, always "response".
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Request ID this response correlates to.
    pub id: String,

    /// Response status.
    pub status: ResponseStatus,

    /// Result payload (for successful responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error details (for error responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            msg_type: "response".to_string(),
            id: id.into(),
            status: ResponseStatus::Ok,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, error: ResponseError) -> Self {
        Self {
            msg_type: "response".to_string(),
            id: id.into(),
            status: ResponseStatus::Error,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }
}

// ============================================================================
// Operation-specific parameter types
// ============================================================================

/// Parameters for HELLO request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloParams {
    pub protocol_version: u16,
    #[serde(default)]
    pub client_name: Option<String>,
}

/// Result for HELLO response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloResult {
    pub protocol_version: u16,
    pub server_name: String,
    pub server_version: String,
}

/// Result for INFO response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResult {
    pub server_name: String,
    pub server_version: String,
    pub protocol_version: u16,
    /// Logical size of the acceptance device in bytes.
    pub device_size: u64,
    /// Maximum bytes consumed by one WRITE.
    pub max_write_bytes: usize,
    pub current_state: u8,
    pub accepting: bool,
    pub accepting_states: usize,
}

/// Parameters for READ request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadParams {
    #[serde(default)]
    pub position: u64,
    pub size: usize,
}

/// Result for READ response. An empty `data` means end of device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    pub data: Vec<u8>,
}

/// Parameters for WRITE request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteParams {
    pub data: Vec<u8>,
}

/// Result for WRITE response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResult {
    /// Number of bytes consumed, possibly fewer than sent.
    pub written: usize,
}

/// Parameters for IOCTL request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoctlParams {
    pub request: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arg: Vec<u8>,
}

/// Result for IOCTL response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoctlResult {
    pub request: u32,
}

/// Result for PREPARE_UPDATE response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareUpdateResult {
    /// Whether the snapshot was published.
    pub saved: bool,
    /// Cursor at save time.
    pub current_state: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = Request::new("1", Operation::PrepareUpdate);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""op":"PREPARE_UPDATE""#));
        assert!(json.contains(r#""type":"request""#));
    }

    #[test]
    fn test_operation_names_match_serde() {
        for op in [
            Operation::Hello,
            Operation::Ping,
            Operation::Bye,
            Operation::Info,
            Operation::Read,
            Operation::Write,
            Operation::Ioctl,
            Operation::PrepareUpdate,
        ] {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
        }
    }

    #[test]
    fn test_ioctl_params_default_arg() {
        let params: IoctlParams = serde_json::from_value(json!({"request": 17409})).unwrap();
        assert_eq!(params.request, crate::ioctl::DFAIOCRESET);
        assert!(params.arg.is_empty());
    }

    #[test]
    fn test_write_params_bytes() {
        let params = WriteParams { data: b"AB".to_vec() };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, json!({"data": [65, 66]}));
    }

    #[test]
    fn test_response_error_serialization() {
        let err = ResponseError::new(ErrorCode::NotSupported, "unsupported control code")
            .with_detail("request", 0x9999);
        let resp = Response::error("1", err);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""code":"NOT_SUPPORTED""#));
        assert!(json.contains(r#""retryable":false"#));
        assert!(!json.contains("result"));
    }
}

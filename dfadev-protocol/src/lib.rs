//! # dfadev-protocol
//!
//! Wire protocol for dfadev (DCP - dfadev Control Protocol).
//!
//! This crate provides:
//! - Binary framing with length prefix and CRC32C validation
//! - JSON request/response envelopes
//! - Character-device operation parameters (read, write, control)
//! - Control codes and stable error codes

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{Decoder, Encoder};
pub use error::{ErrorCode, ProtocolError};
pub use frame::{Frame, FrameFlags, FRAME_HEADER_SIZE, MAGIC};
pub use message::{Operation, Request, Response, ResponseError, ResponseStatus};

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default port for the dfadev server.
pub const DEFAULT_PORT: u16 = 7411;

/// Maximum frame payload size (1 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

/// Size of the logical acceptance device in bytes.
pub const DEVICE_SIZE: u64 = 4;

/// Byte reported by the device when the current state accepts.
pub const ANSWER_ACCEPT: u8 = b'Y';

/// Byte reported by the device when the current state rejects.
pub const ANSWER_REJECT: u8 = b'N';

/// Control codes understood by the device.
pub mod ioctl {
    /// Return to the start state.
    pub const DFAIOCRESET: u32 = 0x4401;
    /// Set a transition; argument is `[from, symbol, to]`.
    pub const DFAIOCADD: u32 = 0x4402;
    /// Mark a state accepting; argument is `[state]`.
    pub const DFAIOCACCEPT: u32 = 0x4403;
    /// Mark a state rejecting; argument is `[state]`.
    pub const DFAIOCREJECT: u32 = 0x4404;

    /// Returns the symbolic name of a known control code.
    pub fn name(request: u32) -> Option<&'static str> {
        match request {
            DFAIOCRESET => Some("DFAIOCRESET"),
            DFAIOCADD => Some("DFAIOCADD"),
            DFAIOCACCEPT => Some("DFAIOCACCEPT"),
            DFAIOCREJECT => Some("DFAIOCREJECT"),
            _ => None,
        }
    }
}

//! # dfadev-server
//!
//! TCP server for dfadev.
//!
//! This crate provides:
//! - The character-device adapter over the automaton
//! - A device actor that serializes every engine operation
//! - TCP connection handling with async I/O
//! - Protocol framing and message dispatch
//! - Startup restore and live-update handoff

pub mod actor;
pub mod config;
pub mod device;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod server;
pub mod session;

pub use actor::{spawn_device_actor, DeviceHandle};
pub use config::{Config, ConfigError, DeviceConfig, LifecycleConfig, NetworkConfig};
pub use device::{Device, DeviceStatus};
pub use error::{DeviceError, ServerError};
pub use handler::{CommandHandler, ServerInfo};
pub use lifecycle::InitMode;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::Session;

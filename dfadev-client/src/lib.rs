//! # dfadev-client
//!
//! Client library for dfadev.
//!
//! This crate provides:
//! - Async TCP client with connection management
//! - Device operations: read, write and control codes
//! - Live-update preparation

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;

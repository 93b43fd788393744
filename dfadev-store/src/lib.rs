//! # dfadev-store
//!
//! Storage layer for dfadev.
//!
//! This crate provides:
//! - A field-keyed store trait with publish, retrieve and delete
//! - In-memory and file-backed stores
//! - Snapshot publish and single-use take for state handoff

pub mod error;
pub mod field;
pub mod file;
pub mod snapshot;

pub use error::StorageError;
pub use field::{FieldKind, FieldStore, FieldValue, MemoryStore};
pub use file::{FieldMeta, FileStore};
pub use snapshot::{publish_snapshot, take_snapshot};

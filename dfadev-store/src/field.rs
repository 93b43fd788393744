//! Field-keyed value stores.

use crate::error::StorageError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The type of a stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    U32,
    Bytes,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::U32 => write!(f, "u32"),
            FieldKind::Bytes => write!(f, "bytes"),
        }
    }
}

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    U32(u32),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::U32(_) => FieldKind::U32,
            FieldValue::Bytes(_) => FieldKind::Bytes,
        }
    }
}

/// A store of values published under field names.
///
/// Publishing overwrites. Deleting an absent key succeeds and returns
/// `false`.
pub trait FieldStore: Send + Sync {
    /// Publishes a value, replacing any previous value for the key.
    fn publish(&self, key: &str, value: FieldValue) -> Result<(), StorageError>;

    /// Retrieves a value without removing it.
    fn retrieve(&self, key: &str) -> Result<Option<FieldValue>, StorageError>;

    /// Removes a value. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    fn publish_u32(&self, key: &str, value: u32) -> Result<(), StorageError> {
        self.publish(key, FieldValue::U32(value))
    }

    fn publish_bytes(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.publish(key, FieldValue::Bytes(value.to_vec()))
    }

    fn retrieve_u32(&self, key: &str) -> Result<Option<u32>, StorageError> {
        match self.retrieve(key)? {
            None => Ok(None),
            Some(FieldValue::U32(v)) => Ok(Some(v)),
            Some(other) => Err(StorageError::KindMismatch {
                key: key.to_string(),
                expected: FieldKind::U32,
                actual: other.kind(),
            }),
        }
    }

    fn retrieve_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.retrieve(key)? {
            None => Ok(None),
            Some(FieldValue::Bytes(v)) => Ok(Some(v)),
            Some(other) => Err(StorageError::KindMismatch {
                key: key.to_string(),
                expected: FieldKind::Bytes,
                actual: other.kind(),
            }),
        }
    }
}

/// Validates a field key: non-empty, `[A-Za-z0-9_-]` only.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Transient in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    fields: RwLock<HashMap<String, FieldValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored fields.
    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }
}

impl FieldStore for MemoryStore {
    fn publish(&self, key: &str, value: FieldValue) -> Result<(), StorageError> {
        validate_key(key)?;
        self.fields.write().insert(key.to_string(), value);
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<FieldValue>, StorageError> {
        validate_key(key)?;
        Ok(self.fields.read().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.fields.write().remove(key).is_some())
    }
}

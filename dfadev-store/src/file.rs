//! File-backed field store.
//!
//! Each field lives in `<key>.field` inside the store directory. An
//! `index.json` file maps keys to their kind, size and CRC32C checksum;
//! retrieval verifies the checksum.

use crate::error::StorageError;
use crate::field::{validate_key, FieldKind, FieldStore, FieldValue};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.json";

/// Metadata stored in the index for each field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub key: String,
    pub kind: FieldKind,
    pub size_bytes: u64,
    pub checksum: String,
    pub published_at: i64,
}

/// Durable store that survives process restarts.
pub struct FileStore {
    dir: PathBuf,
    index: RwLock<HashMap<String, FieldMeta>>,
}

impl FileStore {
    /// Opens or creates a store at the given directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let store = Self {
            dir,
            index: RwLock::new(HashMap::new()),
        };
        store.load_index()?;

        Ok(store)
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns metadata for a field.
    pub fn meta(&self, key: &str) -> Option<FieldMeta> {
        self.index.read().get(key).cloned()
    }

    /// Returns the number of stored fields.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    fn load_index(&self) -> Result<(), StorageError> {
        let index_path = self.dir.join(INDEX_FILE);
        if !index_path.exists() {
            return Ok(());
        }

        let reader = BufReader::new(File::open(&index_path)?);
        let index: HashMap<String, FieldMeta> = serde_json::from_reader(reader)?;
        tracing::debug!(
            "Loaded field index from {} ({} fields)",
            self.dir.display(),
            index.len()
        );
        *self.index.write() = index;

        Ok(())
    }

    fn save_index(&self, index: &HashMap<String, FieldMeta>) -> Result<(), StorageError> {
        let tmp_path = self.dir.join(format!("{}.tmp", INDEX_FILE));
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, index)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, self.dir.join(INDEX_FILE))?;
        Ok(())
    }

    fn field_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.field", key))
    }
}

impl FieldStore for FileStore {
    fn publish(&self, key: &str, value: FieldValue) -> Result<(), StorageError> {
        validate_key(key)?;

        let kind = value.kind();
        let data = match value {
            FieldValue::U32(v) => v.to_be_bytes().to_vec(),
            FieldValue::Bytes(bytes) => bytes,
        };
        let checksum = format!("{:08x}", crc32c::crc32c(&data));

        // Write to a temp file so a crash never leaves a torn field in place
        let path = self.field_path(key);
        let tmp_path = path.with_extension("field.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        let meta = FieldMeta {
            key: key.to_string(),
            kind,
            size_bytes: data.len() as u64,
            checksum,
            published_at: now_millis(),
        };

        let mut index = self.index.write();
        index.insert(key.to_string(), meta);
        self.save_index(&index)?;

        tracing::debug!("Published field {} ({} bytes)", key, data.len());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<FieldValue>, StorageError> {
        validate_key(key)?;

        let meta = match self.index.read().get(key) {
            Some(meta) => meta.clone(),
            None => return Ok(None),
        };

        let path = self.field_path(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::Corruption(format!(
                    "field {} is indexed but {} is missing",
                    key,
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let actual_checksum = format!("{:08x}", crc32c::crc32c(&data));
        if actual_checksum != meta.checksum {
            return Err(StorageError::Corruption(format!(
                "field {} checksum mismatch",
                key
            )));
        }

        let value = match meta.kind {
            FieldKind::U32 => {
                let bytes: [u8; 4] = data.as_slice().try_into().map_err(|_| {
                    StorageError::Corruption(format!(
                        "field {} expected 4 bytes, got {}",
                        key,
                        data.len()
                    ))
                })?;
                FieldValue::U32(u32::from_be_bytes(bytes))
            }
            FieldKind::Bytes => FieldValue::Bytes(data),
        };

        Ok(Some(value))
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;

        let path = self.field_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }

        let mut index = self.index.write();
        let existed = index.remove(key).is_some();
        if existed {
            self.save_index(&index)?;
        }

        Ok(existed)
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

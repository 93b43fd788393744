//! Publishing and taking automaton snapshots.
//!
//! A snapshot is stored as four fields:
//!
//! | key             | kind  | contents                            |
//! |-----------------|-------|-------------------------------------|
//! | `initialized`   | u32   | 1 if an image follows, else 0       |
//! | `current_state` | u32   | cursor                              |
//! | `automaton`     | bytes | 65536 row-major transition entries  |
//! | `accepting`     | bytes | 256 accept flags                    |

use crate::error::StorageError;
use crate::field::FieldStore;
use dfadev_core::{Image, Snapshot};

pub const INITIALIZED_KEY: &str = "initialized";
pub const CURRENT_STATE_KEY: &str = "current_state";
pub const AUTOMATON_KEY: &str = "automaton";
pub const ACCEPTING_KEY: &str = "accepting";

const ALL_KEYS: [&str; 4] = [
    INITIALIZED_KEY,
    CURRENT_STATE_KEY,
    AUTOMATON_KEY,
    ACCEPTING_KEY,
];

/// Publishes a snapshot, overwriting any earlier one.
///
/// The `initialized` flag is written last, so an interrupted publish is
/// taken back as uninitialized.
pub fn publish_snapshot<S>(store: &S, snapshot: &Snapshot) -> Result<(), StorageError>
where
    S: FieldStore + ?Sized,
{
    match snapshot {
        Snapshot::Uninitialized => {
            for key in ALL_KEYS {
                store.delete(key)?;
            }
            store.publish_u32(INITIALIZED_KEY, 0)?;
        }
        Snapshot::Initialized(image) => {
            store.delete(INITIALIZED_KEY)?;
            store.publish_u32(CURRENT_STATE_KEY, image.current_state() as u32)?;
            store.publish_bytes(AUTOMATON_KEY, image.table_bytes())?;
            store.publish_bytes(ACCEPTING_KEY, &image.accepting_bytes())?;
            store.publish_u32(INITIALIZED_KEY, 1)?;
        }
    }

    tracing::info!(
        "Published snapshot (initialized={}, state={:?})",
        snapshot.is_initialized(),
        snapshot.image().map(Image::current_state)
    );
    Ok(())
}

/// Retrieves the published snapshot and removes it from the store.
///
/// Every snapshot field is deleted whether or not decoding succeeds, so a
/// snapshot is consumed at most once. With nothing published the result is
/// [`Snapshot::Uninitialized`]. Data fields are only read when the
/// `initialized` flag is set.
pub fn take_snapshot<S>(store: &S) -> Result<Snapshot, StorageError>
where
    S: FieldStore + ?Sized,
{
    let taken = read_snapshot(store);

    for key in ALL_KEYS {
        if let Err(e) = store.delete(key) {
            tracing::warn!("Failed to delete snapshot field {}: {}", key, e);
        }
    }

    let snapshot = taken?;
    match snapshot.image() {
        Some(image) => tracing::info!(
            "Took snapshot at state {} from store",
            image.current_state()
        ),
        None => tracing::info!("No initialized snapshot published"),
    }
    Ok(snapshot)
}

fn read_snapshot<S>(store: &S) -> Result<Snapshot, StorageError>
where
    S: FieldStore + ?Sized,
{
    match store.retrieve_u32(INITIALIZED_KEY)? {
        None | Some(0) => return Ok(Snapshot::Uninitialized),
        Some(_) => {}
    }

    let current_state = store
        .retrieve_u32(CURRENT_STATE_KEY)?
        .ok_or_else(|| missing(CURRENT_STATE_KEY))?;
    let table = store
        .retrieve_bytes(AUTOMATON_KEY)?
        .ok_or_else(|| missing(AUTOMATON_KEY))?;
    let accepting = store
        .retrieve_bytes(ACCEPTING_KEY)?
        .ok_or_else(|| missing(ACCEPTING_KEY))?;

    let image = Image::from_fields(current_state, table, &accepting)?;
    Ok(Snapshot::Initialized(image))
}

fn missing(key: &str) -> StorageError {
    StorageError::Corruption(format!("incomplete snapshot: missing field {}", key))
}

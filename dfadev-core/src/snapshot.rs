//! Snapshots: the exported state of an automaton.
//!
//! A snapshot is tagged with whether the automaton was ever initialized.
//! Importing [`Snapshot::Uninitialized`] zero-fills; importing
//! [`Snapshot::Initialized`] trusts the image.

use crate::automaton::{State, STATE_COUNT, TABLE_LEN};
use crate::error::CoreError;

/// Exported automaton state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// No automaton was ever populated.
    Uninitialized,
    /// A full copy of an automaton.
    Initialized(Image),
}

impl Snapshot {
    /// Returns whether this snapshot carries an image.
    pub fn is_initialized(&self) -> bool {
        matches!(self, Snapshot::Initialized(_))
    }

    /// Returns the image, if any.
    pub fn image(&self) -> Option<&Image> {
        match self {
            Snapshot::Uninitialized => None,
            Snapshot::Initialized(image) => Some(image),
        }
    }
}

/// Immutable copy of the cursor, transition table and accept set.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    current_state: State,
    table: Box<[State]>,
    accepting: [bool; STATE_COUNT],
}

impl Image {
    pub(crate) fn new(
        current_state: State,
        table: Box<[State]>,
        accepting: [bool; STATE_COUNT],
    ) -> Self {
        debug_assert_eq!(table.len(), TABLE_LEN);
        Self {
            current_state,
            table,
            accepting,
        }
    }

    /// Rebuilds an image from raw fields.
    ///
    /// `table` holds 65536 row-major entries and `accepting` 256 flags where
    /// any non-zero byte means accepting.
    pub fn from_fields(
        current_state: u32,
        table: Vec<u8>,
        accepting: &[u8],
    ) -> Result<Self, CoreError> {
        let current_state =
            State::try_from(current_state).map_err(|_| CoreError::MalformedSnapshot {
                field: "current_state",
                reason: format!("state {} out of range", current_state),
            })?;

        if table.len() != TABLE_LEN {
            return Err(CoreError::MalformedSnapshot {
                field: "automaton",
                reason: format!("expected {} bytes, got {}", TABLE_LEN, table.len()),
            });
        }

        if accepting.len() != STATE_COUNT {
            return Err(CoreError::MalformedSnapshot {
                field: "accepting",
                reason: format!("expected {} bytes, got {}", STATE_COUNT, accepting.len()),
            });
        }

        let mut flags = [false; STATE_COUNT];
        for (flag, &byte) in flags.iter_mut().zip(accepting) {
            *flag = byte != 0;
        }

        Ok(Self::new(current_state, table.into_boxed_slice(), flags))
    }

    /// Returns the cursor at export time.
    pub fn current_state(&self) -> State {
        self.current_state
    }

    /// Returns the row-major transition table.
    pub fn table_bytes(&self) -> &[u8] {
        &self.table
    }

    /// Returns the accept set encoded as one byte per state (0 or 1).
    pub fn accepting_bytes(&self) -> Vec<u8> {
        self.accepting.iter().map(|&a| a as u8).collect()
    }

    pub(crate) fn into_parts(self) -> (State, Box<[State]>, [bool; STATE_COUNT]) {
        (self.current_state, self.table, self.accepting)
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("current_state", &self.current_state)
            .field(
                "accepting_states",
                &self.accepting.iter().filter(|&&a| a).count(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::Automaton;

    fn sample() -> Automaton {
        let mut automaton = Automaton::new();
        automaton.set_transition(0, b'x', 3);
        automaton.set_transition(3, b'y', 250);
        automaton.mark_accepting(250);
        automaton.consume(b"x");
        automaton
    }

    #[test]
    fn test_export_is_initialized() {
        let snapshot = sample().export();
        assert!(snapshot.is_initialized());
        assert_eq!(snapshot.image().unwrap().current_state(), 3);
    }

    #[test]
    fn test_field_roundtrip() {
        let automaton = sample();
        let snapshot = automaton.export();
        let image = snapshot.image().unwrap();

        let rebuilt = Image::from_fields(
            image.current_state() as u32,
            image.table_bytes().to_vec(),
            &image.accepting_bytes(),
        )
        .unwrap();
        assert_eq!(&rebuilt, image);

        let restored = Automaton::from_snapshot(Snapshot::Initialized(rebuilt));
        assert_eq!(restored, automaton);
    }

    #[test]
    fn test_accepting_bytes_encoding() {
        let image = sample().export();
        let bytes = image.image().unwrap().accepting_bytes();
        assert_eq!(bytes.len(), STATE_COUNT);
        assert_eq!(bytes[250], 1);
        assert_eq!(bytes.iter().map(|&b| b as usize).sum::<usize>(), 1);
    }

    #[test]
    fn test_nonzero_accepting_byte_means_accepting() {
        let mut accepting = vec![0u8; STATE_COUNT];
        accepting[0] = 0x7f;
        let image = Image::from_fields(0, vec![0; TABLE_LEN], &accepting).unwrap();

        let automaton = Automaton::from_snapshot(Snapshot::Initialized(image));
        assert!(automaton.is_accepting());
    }

    #[test]
    fn test_state_out_of_range() {
        let result = Image::from_fields(256, vec![0; TABLE_LEN], &[0; STATE_COUNT]);
        assert!(matches!(
            result,
            Err(CoreError::MalformedSnapshot {
                field: "current_state",
                ..
            })
        ));
    }

    #[test]
    fn test_short_table() {
        let result = Image::from_fields(0, vec![0; 100], &[0; STATE_COUNT]);
        assert!(matches!(
            result,
            Err(CoreError::MalformedSnapshot {
                field: "automaton",
                ..
            })
        ));
    }

    #[test]
    fn test_wrong_accepting_length() {
        let result = Image::from_fields(0, vec![0; TABLE_LEN], &[0; 257]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("accepting"));
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }
}

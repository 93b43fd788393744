//! The automaton engine: transition table, accept set and cursor.

use crate::snapshot::{Image, Snapshot};

/// An automaton state. All 256 values are valid states.
pub type State = u8;

/// An input symbol. The alphabet is every 8-bit value.
pub type Symbol = u8;

/// Number of symbols in the alphabet.
pub const ALPHABET_SIZE: usize = 256;

/// Number of addressable states.
pub const STATE_COUNT: usize = 256;

/// The designated start state.
pub const START_STATE: State = 0;

/// Total number of transition table entries.
pub(crate) const TABLE_LEN: usize = STATE_COUNT * ALPHABET_SIZE;

/// A deterministic finite automaton over 8-bit symbols.
///
/// The transition function is total: every `(state, symbol)` pair maps to
/// some state, `0` until edited. The automaton is not internally
/// synchronized; callers serialize all access to one instance.
#[derive(Clone, PartialEq, Eq)]
pub struct Automaton {
    /// Row-major transition table, `table[from * 256 + symbol]`.
    table: Box<[State]>,

    /// Accepting flag per state.
    accepting: [bool; STATE_COUNT],

    /// Current position.
    current: State,
}

impl Automaton {
    /// Creates a zero-filled automaton: every transition leads to state 0,
    /// every state rejects, and the cursor is at the start state.
    pub fn new() -> Self {
        Self {
            table: vec![START_STATE; TABLE_LEN].into_boxed_slice(),
            accepting: [false; STATE_COUNT],
            current: START_STATE,
        }
    }

    /// Returns the cursor to the start state.
    pub fn reset(&mut self) {
        self.current = START_STATE;
    }

    /// Sets `δ(from, symbol) = to`, replacing any earlier value.
    pub fn set_transition(&mut self, from: State, symbol: Symbol, to: State) {
        self.table[index(from, symbol)] = to;
    }

    /// Marks a state as accepting.
    pub fn mark_accepting(&mut self, state: State) {
        self.accepting[state as usize] = true;
    }

    /// Marks a state as rejecting.
    pub fn mark_rejecting(&mut self, state: State) {
        self.accepting[state as usize] = false;
    }

    /// Consumes one symbol and returns the new current state.
    pub fn step(&mut self, symbol: Symbol) -> State {
        self.current = self.table[index(self.current, symbol)];
        self.current
    }

    /// Consumes every symbol in order and returns how many were consumed.
    ///
    /// Consumption cannot fail, so the result is always `symbols.len()`.
    pub fn consume(&mut self, symbols: &[Symbol]) -> usize {
        let mut state = self.current;
        for &symbol in symbols {
            state = self.table[index(state, symbol)];
        }
        self.current = state;
        symbols.len()
    }

    /// Returns whether the current state is accepting.
    pub fn is_accepting(&self) -> bool {
        self.accepting[self.current as usize]
    }

    /// Returns whether the given state is accepting.
    pub fn is_accepting_state(&self, state: State) -> bool {
        self.accepting[state as usize]
    }

    /// Returns `δ(from, symbol)`.
    pub fn transition(&self, from: State, symbol: Symbol) -> State {
        self.table[index(from, symbol)]
    }

    /// Returns the current state.
    pub fn current_state(&self) -> State {
        self.current
    }

    /// Returns the number of accepting states.
    pub fn accepting_count(&self) -> usize {
        self.accepting.iter().filter(|&&a| a).count()
    }

    /// Exports the full state as an initialized snapshot.
    pub fn export(&self) -> Snapshot {
        Snapshot::Initialized(Image::new(
            self.current,
            self.table.clone(),
            self.accepting,
        ))
    }

    /// Replaces the full state from a snapshot.
    ///
    /// An uninitialized snapshot zero-fills the automaton, whatever state it
    /// held before.
    pub fn import(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Uninitialized => {
                tracing::debug!("Importing uninitialized snapshot, zero-filling automaton");
                *self = Self::new();
            }
            Snapshot::Initialized(image) => {
                let (current, table, accepting) = image.into_parts();
                self.current = current;
                self.table = table;
                self.accepting = accepting;
            }
        }
    }

    /// Builds an automaton from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut automaton = Self::new();
        automaton.import(snapshot);
        automaton
    }
}

impl Default for Automaton {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Automaton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Automaton")
            .field("current", &self.current)
            .field("accepting_states", &self.accepting_count())
            .finish_non_exhaustive()
    }
}

#[inline]
fn index(state: State, symbol: Symbol) -> usize {
    (state as usize) * ALPHABET_SIZE + symbol as usize
}

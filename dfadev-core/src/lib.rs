//! # dfadev-core
//!
//! Automaton engine for dfadev.
//!
//! This crate provides:
//! - A total 256x256 transition table over 8-bit symbols
//! - Accept/reject markings per state
//! - Single-step and batch symbol consumption
//! - Snapshot export and import for state handoff

pub mod automaton;
pub mod error;
pub mod snapshot;

pub use automaton::{Automaton, State, Symbol, ALPHABET_SIZE, START_STATE, STATE_COUNT};
pub use error::CoreError;
pub use snapshot::{Image, Snapshot};

//! Startup and handoff of the automaton.
//!
//! A process either starts fresh or takes over the snapshot its predecessor
//! published. Taking a snapshot consumes it, so a later restart without a
//! new save starts from a zero-filled automaton.

use crate::error::ServerError;
use dfadev_core::{Automaton, Snapshot};
use dfadev_store::{publish_snapshot, take_snapshot, FieldStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the automaton is initialized at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    /// Start zero-filled; the store is not consulted.
    Fresh,
    /// Take over the state published by the previous process.
    #[default]
    LiveUpdate,
    /// Restarted after a stop; restores like a live update.
    Restart,
}

impl InitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitMode::Fresh => "fresh",
            InitMode::LiveUpdate => "live_update",
            InitMode::Restart => "restart",
        }
    }
}

impl fmt::Display for InitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "fresh" => Ok(InitMode::Fresh),
            "live_update" | "lu" => Ok(InitMode::LiveUpdate),
            "restart" => Ok(InitMode::Restart),
            other => Err(format!("unknown init mode: {}", other)),
        }
    }
}

/// Builds the automaton for this process.
pub fn init<S>(mode: InitMode, store: &S) -> Result<Automaton, ServerError>
where
    S: FieldStore + ?Sized,
{
    let automaton = match mode {
        InitMode::Fresh => Automaton::new(),
        InitMode::LiveUpdate | InitMode::Restart => {
            let snapshot = take_snapshot(store).map_err(|e| {
                tracing::warn!("Snapshot restore failed: {}", e);
                e
            })?;
            if !snapshot.is_initialized() {
                tracing::info!("No state to restore, starting zero-filled");
            }
            Automaton::from_snapshot(snapshot)
        }
    };

    tracing::info!(
        "Automaton initialized ({}): state {}, {} accepting states",
        mode,
        automaton.current_state(),
        automaton.accepting_count()
    );
    Ok(automaton)
}

/// Publishes a snapshot for a successor process.
pub fn save<S>(snapshot: &Snapshot, store: &S) -> Result<(), ServerError>
where
    S: FieldStore + ?Sized,
{
    publish_snapshot(store, snapshot)?;
    Ok(())
}

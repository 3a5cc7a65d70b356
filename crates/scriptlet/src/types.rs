//! Core types for lifecycle sequencing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase a sequence runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Fresh installation
    Spawn,
    /// Update an existing installation in place
    Respawn,
    /// Uninstall
    Destroy,
}

impl Phase {
    /// Lowercase name used in logs and file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Spawn => "spawn",
            Phase::Respawn => "respawn",
            Phase::Destroy => "destroy",
        }
    }

    /// Whether scriptlets run in reverse configured order
    pub fn is_reversed(&self) -> bool {
        matches!(self, Phase::Destroy)
    }

    /// Parse a phase name
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "spawn" => Some(Phase::Spawn),
            "respawn" => Some(Phase::Respawn),
            "destroy" => Some(Phase::Destroy),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a sequence run
///
/// Positions refer to the configured list, not to execution order, so a
/// destroy failure names the same slot a spawn failure would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceState {
    /// Nothing has run yet
    NotStarted,
    /// The scriptlet at this position is executing
    Running(usize),
    /// Every scriptlet succeeded
    Complete,
    /// The scriptlet at this position failed; later ones never ran
    Failed(usize),
}

impl SequenceState {
    /// Whether the run finished without failure
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Summary of a finished sequence run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Phase that ran
    pub phase: Phase,
    /// Scriptlet names in execution order that completed successfully
    pub completed: Vec<String>,
    /// Final state
    pub state: SequenceState,
}

impl SequenceReport {
    /// Number of scriptlets that completed
    pub fn total(&self) -> usize {
        self.completed.len()
    }
}

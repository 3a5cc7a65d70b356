//! Error types for scriptlet resolution and sequencing

use crate::types::Phase;
use thiserror::Error;

/// Errors raised while resolving or running scriptlets
#[derive(Debug, Error)]
pub enum Error {
    /// A configured name has no registered implementation
    #[error("unknown scriptlet '{name}' (known: {})", .known.join(", "))]
    UnknownScriptlet {
        /// The configured name
        name: String,
        /// Every registered name
        known: Vec<String>,
    },

    /// The configured list is empty
    #[error("no scriptlets configured")]
    EmptySequence,

    /// A scriptlet returned an error; the run stopped there
    #[error("{phase} failed in scriptlet '{name}' (position {position}): {source:#}")]
    ScriptletFailed {
        /// Phase that was running
        phase: Phase,
        /// Scriptlet the failure is attributed to
        name: String,
        /// Position in the configured list
        position: usize,
        /// What went wrong
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Name of the failing scriptlet, if the error came from one
    pub fn scriptlet(&self) -> Option<&str> {
        match self {
            Error::ScriptletFailed { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Result type for scriptlet operations
pub type Result<T> = std::result::Result<T, Error>;

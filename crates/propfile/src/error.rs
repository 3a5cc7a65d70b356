//! Error types for property file operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing a property file.
#[derive(Debug, Error)]
pub enum Error {
    /// The delimiter cannot be used to split lines
    #[error("invalid delimiter: {0:?}")]
    InvalidDelimiter(String),

    /// Reading the file failed
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// File being read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Writing the file failed
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// File being written
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A value could not be interpreted as the requested type
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Key whose value was rejected
        key: String,
        /// The raw value
        value: String,
    },
}

impl Error {
    /// Path of the file involved, when the error is an IO failure.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::Read { path, .. } | Error::Write { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type for property file operations.
pub type Result<T> = std::result::Result<T, Error>;

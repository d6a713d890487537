use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the storage engine.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from disk operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption detected in a run file (bad footer, truncated record).
    #[error("Corruption: {0}")]
    Corruption(String),

    /// Rejected configuration or argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage directory could not be listed while opening the engine.
    #[error("Failed to scan storage directory {path}: {source}")]
    DirectoryScan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

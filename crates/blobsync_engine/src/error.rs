//! Error types for the engine.

use blobsync_storage::StorageError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine runs.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Listing a page failed; fatal to the pair.
    #[error("listing failed for {pair}: {source}")]
    Enumeration {
        /// Pair being enumerated.
        pair: String,
        /// Underlying storage error.
        #[source]
        source: StorageError,
    },

    /// The selection produced no work.
    #[error("no tasks detected for the selected storages and configs")]
    NoPairs,

    /// A ghost is too recent to be removed.
    #[error("cannot remove {key}: difference is newer than {window_secs}s")]
    SafetyWindow {
        /// Source key left in place.
        key: String,
        /// Safety window in seconds.
        window_secs: u64,
    },

    /// Reading or writing the progress file failed.
    #[error("progress file error: {0}")]
    Progress(String),

    /// A required option is missing or invalid.
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

impl EngineError {
    /// Wraps a listing failure for `pair`.
    pub fn enumeration(pair: impl ToString, source: StorageError) -> Self {
        Self::Enumeration {
            pair: pair.to_string(),
            source,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::Progress(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Progress(e.to_string())
    }
}

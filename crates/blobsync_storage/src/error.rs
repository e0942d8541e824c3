//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested object does not exist.
    #[error("object not found: {key}")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// The key exists but does not name a file.
    #[error("requested path is not a file: {key}")]
    NotAFile {
        /// The offending key.
        key: String,
    },

    /// The key is empty, absolute or escapes the store root.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A listing cursor could not be parsed.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// The store does not implement an optional capability.
    #[error("storage {storage} does not support required '{capability}'")]
    Unsupported {
        /// Storage id.
        storage: String,
        /// Name of the missing capability.
        capability: &'static str,
    },

    /// The store configuration is invalid.
    #[error("invalid storage configuration: {0}")]
    Config(String),

    /// The native backend reported an error.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates a not-found error for `key`.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Returns true if the error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound { .. } => true,
            StorageError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns true if repeating the operation may succeed.
    ///
    /// Absence, malformed input and missing capabilities are definitive.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Io(e) => e.kind() != io::ErrorKind::NotFound,
            StorageError::Backend(_) => true,
            _ => false,
        }
    }
}

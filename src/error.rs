//! Error types for flatfs

use thiserror::Error;

/// Result type alias for flatfs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in flatfs operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("Dangling pointer: '{name}' targets index {target}, but only {len} records exist")]
    DanglingPointer {
        name: String,
        target: usize,
        len: usize,
    },

    #[error("Cyclic pointer chain through '{0}'")]
    CyclicPointer(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid store file: {0}")]
    InvalidFile(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Seal error: {0}")]
    Seal(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            index,
            reason: reason.into(),
        }
    }
}

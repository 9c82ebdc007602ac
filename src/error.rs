//! Error types for the dinoq crate

use thiserror::Error;

/// Main error type for the dinoq crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid action index {index} (must be 0-{max})")]
    InvalidActionIndex { index: usize, max: usize },

    #[error("unknown obstacle kind '{name}'")]
    UnknownObstacleKind { name: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("snapshot version {found} is not supported (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },

    #[error("snapshot at '{path}' is corrupt: {reason}")]
    SnapshotCorrupt { path: String, reason: String },

    #[error("snapshot '{field}' is {saved} but {requested} was requested (pass --adopt-saved-config to keep the saved value)")]
    SnapshotConfigMismatch {
        field: String,
        saved: String,
        requested: String,
    },

    #[error("snapshot not found at '{path}'")]
    SnapshotMissing { path: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to {operation}: {message}")]
    SerializationContext { operation: String, message: String },

    #[error("progress bar template error: {message}")]
    ProgressBarTemplate { message: String },
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            operation: "IO operation".to_string(),
            source,
        }
    }
}

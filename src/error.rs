use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Explorer tree error types.
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// I/O errors from snapshot and filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization/deserialization errors.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The backing language service failed or is unavailable.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A node operation needed a handler identifier or URI that is unset.
    #[error("Node '{0}' has no handler identifier or URI")]
    MissingIdentifier(String),

    /// Configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(String),
}

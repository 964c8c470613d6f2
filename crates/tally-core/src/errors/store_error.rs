//! Persistence-layer errors for the JSON record store.

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Serialization failed: {message}")]
    Serialize { message: String },

    #[error("Store locked by another process: {path}")]
    Locked { path: String },
}

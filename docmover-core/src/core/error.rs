//! Error types for the DocMover core library.

use thiserror::Error;

/// All errors that can occur within the DocMover core library.
#[derive(Debug, Error)]
pub enum DocMoverError {
    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A document or block ID was requested that does not exist in the store.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// A container ID was requested that does not exist in the store.
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// A move would make a document its own ancestor.
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// A hierarchical path could not be resolved to a parent document.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The opened file is not a valid DocMover workspace.
    #[error("Invalid workspace: {0}")]
    InvalidWorkspace(String),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data (order maps, operations) could not be (de)serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`DocMoverError`].
pub type Result<T> = std::result::Result<T, DocMoverError>;

impl DocMoverError {
    /// True for the "root or referenced document missing" class of failures.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DocumentNotFound(_) | Self::ContainerNotFound(_) | Self::InvalidPath(_)
        )
    }

    /// True when the backing store could not be queried or written.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Io(_) | Self::Json(_) | Self::InvalidWorkspace(_)
        )
    }

    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Failed to access the document store: {e}"),
            Self::DocumentNotFound(_) => "Document no longer exists".to_string(),
            Self::ContainerNotFound(_) => "Notebook no longer exists".to_string(),
            Self::InvalidMove(msg) => msg.clone(),
            Self::InvalidPath(path) => format!("No parent document at {path}"),
            Self::InvalidWorkspace(_) => "Could not open workspace file".to_string(),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}

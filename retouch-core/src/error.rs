//! Error types for editing operations.

use thiserror::Error;

/// Result type for editing operations.
pub type EditorResult<T> = Result<T, EditorError>;

/// Errors that can occur while editing.
///
/// Boundary `undo`/`redo` calls are not errors; they are silent no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// Input was rejected before any mutation (bad upload, bad transform params).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The transform gateway reported a failure or could not be reached.
    #[error("{operation} failed: {message}")]
    Gateway {
        /// The operation that was attempted (e.g. `filter`, `resize`).
        operation: String,
        /// Human readable failure description.
        message: String,
    },

    /// `restore` was called with an index outside the history.
    #[error("History index {index} out of range (history has {len} entries)")]
    OutOfRange {
        /// The requested index.
        index: usize,
        /// Number of entries in the history.
        len: usize,
    },

    /// The current state was queried before anything was committed.
    #[error("History is empty")]
    EmptyHistory,

    /// A transform is already in flight; surface mutations are disabled.
    #[error("A transform request is already pending")]
    TransformPending,

    /// The session was shut down.
    #[error("Session is closed")]
    SessionClosed,

    /// A remote operation needs an image that has not been loaded yet.
    #[error("No image loaded")]
    NoImage,

    /// The raster surface could not decode or encode image data.
    #[error("Surface error: {0}")]
    Surface(String),
}

impl EditorError {
    /// Build a gateway error for the named operation.
    pub fn gateway(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Gateway {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

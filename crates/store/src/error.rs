//! Error types for the key/value backend layer.

use std::io;

use snafu::Snafu;

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in a key/value backend.
#[derive(Debug, Snafu)]
pub enum StoreError {
    /// I/O error from the underlying storage.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Backend-specific failure.
    #[snafu(display("backend error: {message}"))]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

// Automatic conversion from io::Error for ergonomic ? usage
impl From<io::Error> for StoreError {
    fn from(source: io::Error) -> Self {
        StoreError::Io { source }
    }
}

//! Error types for the tangle object store.

use snafu::Snafu;
use weft_store::StoreError;
use weft_types::CodecError;

/// Result type alias for tangle operations.
pub type Result<T, E = TangleError> = std::result::Result<T, E>;

/// Errors that can occur in the tangle object store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TangleError {
    /// The store has been shut down; no further operations are accepted.
    #[snafu(display("object store has been shut down"))]
    Shutdown,

    /// The backing key/value store failed.
    #[snafu(display("store error: {source}"))]
    Store {
        /// The underlying backend error.
        source: StoreError,
    },

    /// A persisted object payload could not be encoded or decoded.
    #[snafu(display("codec error: {source}"))]
    Codec {
        /// The underlying codec error.
        source: CodecError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_display() {
        assert_eq!(TangleError::Shutdown.to_string(), "object store has been shut down");
    }
}

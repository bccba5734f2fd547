//! Error types for the snapshot file codec.

use std::io;

use snafu::Snafu;
use weft_types::AddressError;

/// Result type alias for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Errors that can occur while writing or reading a snapshot file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SnapshotError {
    /// I/O error from the underlying sink or source.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The snapshot format version is not supported.
    #[snafu(display("unsupported snapshot version: {version}"))]
    UnsupportedVersion {
        /// The unsupported version byte.
        version: u8,
    },

    /// The snapshot kind discriminant is not Full or Delta.
    #[snafu(display("invalid snapshot kind: {kind}"))]
    InvalidSnapshotKind {
        /// The invalid discriminant byte.
        kind: u8,
    },

    /// A delta snapshot header declares a non-zero output count.
    #[snafu(display("delta snapshot declares {count} outputs"))]
    DeltaWithOutputs {
        /// The declared output count.
        count: u64,
    },

    /// An address failed to decode.
    #[snafu(display("address error: {source}"))]
    Address {
        /// The underlying address error.
        source: AddressError,
    },

    /// A per-diff item count does not fit the wire format.
    #[snafu(display("count {count} exceeds the u32 wire format"))]
    CountOverflow {
        /// The overflowing count.
        count: usize,
    },

    /// The file ended inside a section.
    #[snafu(display("unexpected end of file in {section}"))]
    Truncated {
        /// The section being read when the file ended.
        section: &'static str,
    },

    /// Bytes remain after the last milestone diff.
    #[snafu(display("trailing bytes after the last milestone diff"))]
    TrailingBytes,

    /// A user callback or producer failed; the error is passed through.
    #[snafu(display("callback error: {source}"))]
    Callback {
        /// The propagated callback error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No snapshot file exists at the given path.
    #[snafu(display("snapshot not found: {path}"))]
    NotFound {
        /// The path that was checked.
        path: String,
    },
}

impl SnapshotError {
    /// Wraps a user error for propagation through the codec.
    pub fn callback(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Callback { source: source.into() }
    }
}

// Automatic conversion from io::Error for ergonomic ? usage
impl From<io::Error> for SnapshotError {
    fn from(source: io::Error) -> Self {
        SnapshotError::Io { source }
    }
}

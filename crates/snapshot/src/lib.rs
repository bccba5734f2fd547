//! weft-snapshot: the local snapshot file codec for the weft node.
//!
//! A snapshot file serializes the state needed to bootstrap or resume a
//! node: solid entry points, unspent outputs, and per-milestone ledger
//! diffs, behind a fixed 50-byte header. The codec is streaming and
//! bounded-memory on both sides:
//!
//! - [`write_snapshot`] — drives caller-supplied producers and patches the
//!   final section counts back into the header (the sink must be seekable)
//! - [`read_snapshot`] — parses the file and hands each item to a
//!   caller-supplied consumer, enforcing counts and strict end of file
//! - [`SnapshotManager`] — names, lists, and prunes snapshot files on disk
//!
//! All multi-byte integers in the format are little-endian. Only
//! [`SUPPORTED_FORMAT_VERSION`] is read or written; there is no
//! cross-version compatibility.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entities;
pub mod error;
pub mod header;
pub mod manager;
pub mod read;
pub mod write;

pub use entities::{MilestoneDiff, Output, Spent};
pub use error::{Result, SnapshotError};
pub use header::{
    FileHeader, HEADER_LENGTH, ReadFileHeader, SUPPORTED_FORMAT_VERSION, SnapshotKind,
};
pub use manager::{SnapshotManager, parse_snapshot_filename, snapshot_filename};
pub use read::read_snapshot;
pub use write::{WrittenCounts, write_snapshot};

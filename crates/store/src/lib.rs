//! weft-store: key/value backend abstraction for the weft node.
//!
//! The embedded storage engine itself is an external collaborator; this
//! crate defines the seam the node consumes it through:
//!
//! - [`KvBackend`] — prefixed key spaces over get/put/delete/iterate/flush
//! - [`MemoryBackend`] — a `BTreeMap`-backed implementation for tests and
//!   embedding

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod memory;

pub use backend::KvBackend;
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;

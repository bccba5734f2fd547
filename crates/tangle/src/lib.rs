//! weft-tangle: the reference-counted transaction/metadata twin store.
//!
//! Two parallel key spaces — transaction bodies and transaction metadata —
//! are cached behind reference-counted handles over a persistent key/value
//! backend:
//!
//! - [`ObjectStorage`] — the generic cache for one space: pinned handles,
//!   idle-time eviction with write-back, per-key factory exclusion
//! - [`Tangle`] — the twin store coordinating the body/metadata pair
//!
//! A transaction exists iff both halves exist; see [`Tangle`] for how that
//! invariant is maintained.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod metadata;
pub mod object_storage;
pub mod storable;
#[allow(clippy::module_inception)]
pub mod tangle;
pub mod transaction;

pub use error::{Result, TangleError};
pub use metadata::TransactionMetadata;
pub use object_storage::{CachedObject, ObjectStorage};
pub use storable::Storable;
pub use tangle::{
    CachedMetadata, CachedTransaction, CachedTransactions, SPACE_TRANSACTION_METADATA,
    SPACE_TRANSACTIONS, Tangle,
};
pub use transaction::Transaction;

//! Key/value backend abstraction.
//!
//! The node persists objects through this trait rather than a concrete
//! embedded engine, so tests inject [`MemoryBackend`](crate::MemoryBackend)
//! and production wires in whatever engine the deployment uses. Keys live in
//! single-byte-prefixed spaces; the backend treats values as opaque.

use crate::error::Result;

/// A persistent key/value backend with prefixed key spaces.
///
/// All implementations must satisfy these invariants:
/// - Operations on distinct spaces never observe each other's keys.
/// - `put` overwrites; `delete` of a missing key reports `false`.
/// - `for_each_key` visits each key present at the moment it is visited;
///   concurrent mutation is permitted and the visited set is not a snapshot
///   of the space as a whole.
/// - `flush` blocks until previously acknowledged writes are durable.
pub trait KvBackend: Send + Sync {
    /// Reads the value stored under `key` in `space`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or backend failure.
    fn get(&self, space: u8, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key` in `space`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or backend failure.
    fn put(&self, space: u8, key: &[u8], value: &[u8]) -> Result<()>;

    /// Deletes `key` from `space`. Returns `true` if the key existed.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or backend failure.
    fn delete(&self, space: u8, key: &[u8]) -> Result<bool>;

    /// Checks whether `key` exists in `space`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or backend failure.
    fn contains(&self, space: u8, key: &[u8]) -> Result<bool> {
        Ok(self.get(space, key)?.is_some())
    }

    /// Visits every key in `space` in the backend's key order.
    ///
    /// The callback returns `true` to continue, `false` to stop early.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or backend failure.
    fn for_each_key(&self, space: u8, cb: &mut dyn FnMut(&[u8]) -> bool) -> Result<()>;

    /// Flushes all acknowledged writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn flush(&self) -> Result<()>;
}

//! In-memory key/value backend.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::backend::KvBackend;
use crate::error::Result;

/// In-memory, `BTreeMap`-based backend.
///
/// Intended for tests and embedding. Keys iterate in byte order within a
/// space. Never fails; `flush` is a no-op.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<(u8, Vec<u8>), Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored in `space`.
    pub fn len(&self, space: u8) -> usize {
        self.entries.read().range(space_range(space)).count()
    }

    /// Returns `true` if `space` holds no keys.
    pub fn is_empty(&self, space: u8) -> bool {
        self.len(space) == 0
    }
}

// All keys of one space sort contiguously under the (space, key) tuple.
fn space_range(space: u8) -> (Bound<(u8, Vec<u8>)>, Bound<(u8, Vec<u8>)>) {
    let start = Bound::Included((space, Vec::new()));
    let end = match space.checked_add(1) {
        Some(next) => Bound::Excluded((next, Vec::new())),
        None => Bound::Unbounded,
    };
    (start, end)
}

impl KvBackend for MemoryBackend {
    fn get(&self, space: u8, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(&(space, key.to_vec())).cloned())
    }

    fn put(&self, space: u8, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.write().insert((space, key.to_vec()), value.to_vec());
        Ok(())
    }

    fn delete(&self, space: u8, key: &[u8]) -> Result<bool> {
        Ok(self.entries.write().remove(&(space, key.to_vec())).is_some())
    }

    fn contains(&self, space: u8, key: &[u8]) -> Result<bool> {
        Ok(self.entries.read().contains_key(&(space, key.to_vec())))
    }

    fn for_each_key(&self, space: u8, cb: &mut dyn FnMut(&[u8]) -> bool) -> Result<()> {
        // Collect first so the callback can re-enter the backend without
        // holding the map lock.
        let keys: Vec<Vec<u8>> = self
            .entries
            .read()
            .range(space_range(space))
            .map(|((_, key), _)| key.clone())
            .collect();
        for key in keys {
            if !cb(&key) {
                break;
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("total_keys", &self.entries.read().len())
            .finish()
    }
}

//! Reference-counted object cache over one key/value space.
//!
//! Every successful acquisition pins its entry with a +1 reference count;
//! the pin is dropped when the handle is dropped. An unpinned entry lingers
//! for the configured cache time before it becomes an eviction candidate;
//! a force release skips the linger. Dirty entries are written back to the
//! backend before removal, so eviction never loses data.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use snafu::ResultExt;
use tracing::warn;
use weft_store::KvBackend;
use weft_types::{CacheConfig, TxHash};

use crate::error::{CodecSnafu, Result, ShutdownSnafu, StoreSnafu};
use crate::storable::Storable;

/// Number of locks in the per-key striped lock set.
const LOCK_STRIPES: usize = 64;

/// Cache insertions between opportunistic eviction sweeps.
const SWEEP_INTERVAL: usize = 256;

struct Entry<T> {
    object: RwLock<T>,
    /// Number of live handles pinning this entry.
    ref_count: AtomicUsize,
    /// Entry differs from (or is absent in) the backend.
    modified: AtomicBool,
    /// A force release requested eviction without the idle linger.
    evict_now: AtomicBool,
    /// When the last pin was dropped. `None` while pinned.
    released_at: Mutex<Option<Instant>>,
}

impl<T> Entry<T> {
    fn new(object: T, modified: bool) -> Self {
        Self {
            object: RwLock::new(object),
            ref_count: AtomicUsize::new(1),
            modified: AtomicBool::new(modified),
            evict_now: AtomicBool::new(false),
            released_at: Mutex::new(None),
        }
    }
}

struct Inner<T> {
    backend: Arc<dyn KvBackend>,
    space: u8,
    config: CacheConfig,
    entries: RwLock<HashMap<TxHash, Arc<Entry<T>>>>,
    /// Per-key exclusion for factory runs, indexed by key hash.
    stripes: Vec<Mutex<()>>,
    inserts_since_sweep: AtomicUsize,
    shut_down: AtomicBool,
}

impl<T: Storable> Inner<T> {
    fn persist_entry(&self, key: &TxHash, entry: &Entry<T>) -> Result<()> {
        let bytes = entry.object.read().to_bytes().context(CodecSnafu)?;
        self.backend.put(self.space, key.as_bytes(), &bytes).context(StoreSnafu)?;
        entry.modified.store(false, Ordering::Release);
        Ok(())
    }

    /// Evicts `key` if it is unpinned and past its linger (or force-flagged).
    fn evict_key(&self, key: &TxHash) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        let mut entries = self.entries.write();
        let Some(entry) = entries.get(key).cloned() else {
            return;
        };
        if entry.ref_count.load(Ordering::Acquire) != 0 {
            return;
        }
        if !self.entry_expired(&entry) {
            return;
        }
        if entry.modified.load(Ordering::Acquire) {
            if let Err(err) = self.persist_entry(key, &entry) {
                warn!(key = ?key, error = %err, "write-back failed, keeping entry cached");
                return;
            }
        }
        entries.remove(key);
    }

    fn entry_expired(&self, entry: &Entry<T>) -> bool {
        if entry.evict_now.load(Ordering::Acquire) {
            return true;
        }
        match *entry.released_at.lock() {
            Some(released_at) => released_at.elapsed() >= self.config.cache_time,
            None => false,
        }
    }
}

/// A pinned handle on a cached object.
///
/// Dropping the handle releases its pin; the entry then lingers in the cache
/// for the configured cache time. [`release_force`](Self::release_force)
/// skips the linger. [`retain`](Self::retain) produces an additional,
/// independently released pin.
pub struct CachedObject<T: Storable> {
    key: TxHash,
    entry: Arc<Entry<T>>,
    inner: Arc<Inner<T>>,
    acquired_at: Instant,
    released: bool,
}

impl<T: Storable> CachedObject<T> {
    /// The storage key of this object.
    pub fn key(&self) -> &TxHash {
        &self.key
    }

    /// Read access to the object.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.entry.object.read()
    }

    /// Mutates the object and marks it for write-back.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        let mut object = self.entry.object.write();
        f(&mut object);
        self.entry.modified.store(true, Ordering::Release);
    }

    /// Acquires an additional pin on the same entry.
    pub fn retain(&self) -> CachedObject<T> {
        self.entry.ref_count.fetch_add(1, Ordering::AcqRel);
        make_handle(&self.inner, self.key, Arc::clone(&self.entry))
    }

    /// Releases the pin without waiting out the cache-time linger.
    pub fn release_force(mut self) {
        self.release(true);
    }

    /// Runs `f` with a borrowed reference, then force-releases.
    ///
    /// The release happens on every exit path; if `f` panics the pin is
    /// dropped during unwinding.
    pub fn consume<R>(self, f: impl FnOnce(&T) -> R) -> R {
        let result = {
            let object = self.entry.object.read();
            f(&object)
        };
        self.release_force();
        result
    }

    fn release(&mut self, force: bool) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(leak) = &self.inner.config.leak_detection {
            let held = self.acquired_at.elapsed();
            if held > leak.max_consumer_hold_time {
                warn!(
                    key = ?self.key,
                    held_secs = held.as_secs(),
                    "handle held past the leak-detection threshold"
                );
            }
        }

        if force {
            self.entry.evict_now.store(true, Ordering::Release);
        }
        let previous = self.entry.ref_count.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            *self.entry.released_at.lock() = Some(Instant::now());
            if force || self.inner.config.cache_time.is_zero() {
                self.inner.evict_key(&self.key);
            }
        }
    }
}

impl<T: Storable> Drop for CachedObject<T> {
    fn drop(&mut self) {
        self.release(false);
    }
}

impl<T: Storable> std::fmt::Debug for CachedObject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedObject")
            .field("key", &self.key)
            .field("ref_count", &self.entry.ref_count.load(Ordering::Relaxed))
            .finish()
    }
}

fn make_handle<T: Storable>(
    inner: &Arc<Inner<T>>,
    key: TxHash,
    entry: Arc<Entry<T>>,
) -> CachedObject<T> {
    if let Some(leak) = &inner.config.leak_detection {
        let consumers = entry.ref_count.load(Ordering::Acquire);
        if consumers > leak.max_consumers_per_object {
            warn!(key = ?key, consumers, "suspiciously many simultaneous handles on one object");
        }
    }
    entry.evict_now.store(false, Ordering::Release);
    CachedObject { key, entry, inner: Arc::clone(inner), acquired_at: Instant::now(), released: false }
}

/// Reference-counted, idle-expiring object cache over one backend space.
pub struct ObjectStorage<T: Storable> {
    inner: Arc<Inner<T>>,
}

impl<T: Storable> ObjectStorage<T> {
    /// Creates a storage over `space` of `backend`.
    pub fn new(backend: Arc<dyn KvBackend>, space: u8, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                space,
                config,
                entries: RwLock::new(HashMap::new()),
                stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
                inserts_since_sweep: AtomicUsize::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Loads an object from the cache or the backend.
    ///
    /// Returns `None` on a miss; a miss is not an error. On success the
    /// returned handle carries a +1 pin.
    ///
    /// # Errors
    ///
    /// Fails after shutdown, on backend failure, or if a persisted payload
    /// cannot be decoded.
    pub fn load(&self, key: &TxHash) -> Result<Option<CachedObject<T>>> {
        self.ensure_open()?;
        let _stripe = self.stripe(key).lock();

        {
            let entries = self.inner.entries.read();
            if let Some(entry) = entries.get(key) {
                // Pin before the map lock is dropped so a concurrent sweep
                // cannot observe the entry unpinned.
                entry.ref_count.fetch_add(1, Ordering::AcqRel);
                let entry = Arc::clone(entry);
                drop(entries);
                return Ok(Some(make_handle(&self.inner, *key, entry)));
            }
        }

        let Some(bytes) =
            self.inner.backend.get(self.inner.space, key.as_bytes()).context(StoreSnafu)?
        else {
            return Ok(None);
        };
        let object = T::from_key_and_bytes(key, &bytes).context(CodecSnafu)?;
        let entry = Arc::new(Entry::new(object, false));
        self.insert_entry(*key, Arc::clone(&entry));
        Ok(Some(make_handle(&self.inner, *key, entry)))
    }

    /// Returns the cached or persisted object for `key`, or creates it.
    ///
    /// The factory runs under per-key exclusion: of all concurrent calls for
    /// one key at most one factory runs, and exactly that call reports
    /// `true`. The returned handle carries a +1 pin either way.
    ///
    /// # Errors
    ///
    /// Fails after shutdown, on backend failure, or if a persisted payload
    /// cannot be decoded.
    pub fn compute_if_absent(
        &self,
        key: &TxHash,
        factory: impl FnOnce(&TxHash) -> T,
    ) -> Result<(CachedObject<T>, bool)> {
        self.ensure_open()?;
        let _stripe = self.stripe(key).lock();

        {
            let entries = self.inner.entries.read();
            if let Some(entry) = entries.get(key) {
                entry.ref_count.fetch_add(1, Ordering::AcqRel);
                let entry = Arc::clone(entry);
                drop(entries);
                return Ok((make_handle(&self.inner, *key, entry), false));
            }
        }

        if let Some(bytes) =
            self.inner.backend.get(self.inner.space, key.as_bytes()).context(StoreSnafu)?
        {
            let object = T::from_key_and_bytes(key, &bytes).context(CodecSnafu)?;
            let entry = Arc::new(Entry::new(object, false));
            self.insert_entry(*key, Arc::clone(&entry));
            return Ok((make_handle(&self.inner, *key, entry), false));
        }

        let object = factory(key);
        let entry = Arc::new(Entry::new(object, true));
        self.insert_entry(*key, Arc::clone(&entry));
        Ok((make_handle(&self.inner, *key, entry), true))
    }

    /// Checks whether `key` exists in the cache or the backend.
    ///
    /// Does not affect reference counts.
    ///
    /// # Errors
    ///
    /// Fails after shutdown or on backend failure.
    pub fn contains(&self, key: &TxHash) -> Result<bool> {
        self.ensure_open()?;
        if self.inner.entries.read().contains_key(key) {
            return Ok(true);
        }
        self.inner.backend.contains(self.inner.space, key.as_bytes()).context(StoreSnafu)
    }

    /// Removes `key` from the cache and the backend.
    ///
    /// Outstanding handles stay usable but the object is gone from the
    /// store; it is not written back on release.
    ///
    /// # Errors
    ///
    /// Fails after shutdown or on backend failure.
    pub fn delete(&self, key: &TxHash) -> Result<bool> {
        self.ensure_open()?;
        let _stripe = self.stripe(key).lock();
        let cached = self.inner.entries.write().remove(key).is_some();
        let persisted =
            self.inner.backend.delete(self.inner.space, key.as_bytes()).context(StoreSnafu)?;
        Ok(cached || persisted)
    }

    /// Visits every persisted key in this space. Cache-only entries that
    /// have not been written back yet are not visited.
    ///
    /// The callback returns `true` to continue, `false` to stop early.
    ///
    /// # Errors
    ///
    /// Fails after shutdown or on backend failure.
    pub fn for_each_key(&self, mut cb: impl FnMut(&TxHash) -> bool) -> Result<()> {
        self.ensure_open()?;
        self.inner
            .backend
            .for_each_key(self.inner.space, &mut |bytes| match TxHash::from_slice(bytes) {
                Ok(hash) => cb(&hash),
                Err(err) => {
                    warn!(space = self.inner.space, error = %err, "skipping malformed key");
                    true
                },
            })
            .context(StoreSnafu)
    }

    /// Evicts every unpinned entry past its linger. Returns the number of
    /// entries removed. Write-back failures keep the entry cached.
    pub fn sweep(&self) -> usize {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return 0;
        }
        let mut evicted = 0;
        let mut entries = self.inner.entries.write();
        entries.retain(|key, entry| {
            let entry: &Entry<T> = entry;
            if entry.ref_count.load(Ordering::Acquire) != 0 {
                return true;
            }
            if !self.inner.entry_expired(entry) {
                return true;
            }
            if entry.modified.load(Ordering::Acquire) {
                if let Err(err) = self.inner.persist_entry(key, entry) {
                    warn!(key = ?key, error = %err, "write-back failed, keeping entry cached");
                    return true;
                }
            }
            evicted += 1;
            false
        });
        evicted
    }

    /// Writes back every dirty entry, flushes the backend, and sweeps out
    /// expired entries.
    ///
    /// # Errors
    ///
    /// Fails after shutdown, or if a write-back or the backend flush fails.
    pub fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        self.write_back_all()?;
        self.inner.backend.flush().context(StoreSnafu)?;
        self.sweep();
        Ok(())
    }

    /// Flushes, then drops the whole cache and fails all further operations.
    ///
    /// # Errors
    ///
    /// Fails if already shut down, or if the final flush fails.
    pub fn shutdown(&self) -> Result<()> {
        self.ensure_open()?;
        self.inner.shut_down.store(true, Ordering::Release);
        self.write_back_all()?;
        self.inner.backend.flush().context(StoreSnafu)?;
        self.inner.entries.write().clear();
        Ok(())
    }

    /// Number of entries currently cached (pinned or lingering).
    pub fn cached_len(&self) -> usize {
        self.inner.entries.read().len()
    }

    fn write_back_all(&self) -> Result<()> {
        let entries = self.inner.entries.read();
        for (key, entry) in entries.iter() {
            if entry.modified.load(Ordering::Acquire) {
                self.inner.persist_entry(key, entry)?;
            }
        }
        Ok(())
    }

    fn insert_entry(&self, key: TxHash, entry: Arc<Entry<T>>) {
        self.inner.entries.write().insert(key, entry);
        let inserts = self.inner.inserts_since_sweep.fetch_add(1, Ordering::AcqRel) + 1;
        if inserts >= SWEEP_INTERVAL {
            self.inner.inserts_since_sweep.store(0, Ordering::Release);
            self.sweep();
        }
    }

    fn stripe(&self, key: &TxHash) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.as_bytes().hash(&mut hasher);
        &self.inner.stripes[(hasher.finish() as usize) % LOCK_STRIPES]
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return ShutdownSnafu.fail();
        }
        Ok(())
    }
}

impl<T: Storable> Clone for ObjectStorage<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Storable> std::fmt::Debug for ObjectStorage<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("space", &self.inner.space)
            .field("cached", &self.cached_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use weft_store::MemoryBackend;
    use weft_types::CodecError;

    use super::*;
    use crate::error::TangleError;

    #[derive(Debug, PartialEq)]
    struct Payload {
        hash: TxHash,
        value: u64,
    }

    impl Storable for Payload {
        fn from_key_and_bytes(key: &TxHash, bytes: &[u8]) -> Result<Self, CodecError> {
            Ok(Self { hash: *key, value: weft_types::decode(bytes)? })
        }

        fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
            weft_types::encode(&self.value)
        }
    }

    fn hash(byte: u8) -> TxHash {
        TxHash::new([byte; 49])
    }

    fn storage(cache_time: Duration) -> ObjectStorage<Payload> {
        let config = CacheConfig { cache_time, leak_detection: None };
        ObjectStorage::new(Arc::new(MemoryBackend::new()), 0, config)
    }

    #[test]
    fn compute_if_absent_runs_factory_once() {
        let storage = storage(Duration::from_secs(60));
        let key = hash(1);

        let (first, created) =
            storage.compute_if_absent(&key, |key| Payload { hash: *key, value: 7 }).unwrap();
        assert!(created);

        let (second, created) =
            storage.compute_if_absent(&key, |_| panic!("factory must not run twice")).unwrap();
        assert!(!created);
        assert_eq!(second.get().value, 7);

        drop(first);
        drop(second);
    }

    #[test]
    fn load_miss_is_none_not_error() {
        let storage = storage(Duration::from_secs(60));
        assert!(storage.load(&hash(9)).unwrap().is_none());
    }

    #[test]
    fn force_release_evicts_and_persists() {
        let storage = storage(Duration::from_secs(3600));
        let key = hash(2);

        let (handle, _) =
            storage.compute_if_absent(&key, |key| Payload { hash: *key, value: 42 }).unwrap();
        assert_eq!(storage.cached_len(), 1);

        handle.release_force();
        assert_eq!(storage.cached_len(), 0, "force release skips the linger");

        // The dirty entry was written back, so a load round-trips it.
        let reloaded = storage.load(&key).unwrap().expect("persisted on eviction");
        assert_eq!(reloaded.get().value, 42);
        reloaded.release_force();
    }

    #[test]
    fn unforced_release_lingers_until_sweep() {
        let storage = storage(Duration::ZERO);
        let key = hash(3);

        let (handle, _) =
            storage.compute_if_absent(&key, |key| Payload { hash: *key, value: 1 }).unwrap();
        let retained = handle.retain();
        drop(handle);
        // Still pinned by the retained handle.
        assert_eq!(storage.cached_len(), 1);

        drop(retained);
        // cache_time zero: the final drop evicts immediately.
        assert_eq!(storage.cached_len(), 0);
    }

    #[test]
    fn sweep_respects_pins_and_linger() {
        let storage = storage(Duration::from_secs(3600));
        let key = hash(4);

        let (handle, _) =
            storage.compute_if_absent(&key, |key| Payload { hash: *key, value: 5 }).unwrap();
        assert_eq!(storage.sweep(), 0, "pinned entries are never evicted");

        drop(handle);
        assert_eq!(storage.sweep(), 0, "entry still inside its idle linger");
        assert_eq!(storage.cached_len(), 1);
    }

    #[test]
    fn consume_releases_on_return() {
        let storage = storage(Duration::from_secs(3600));
        let key = hash(5);

        let (handle, _) =
            storage.compute_if_absent(&key, |key| Payload { hash: *key, value: 11 }).unwrap();
        let value = handle.consume(|payload| payload.value);
        assert_eq!(value, 11);
        assert_eq!(storage.cached_len(), 0);
    }

    #[test]
    fn modify_marks_dirty_and_flush_persists() {
        let backend = Arc::new(MemoryBackend::new());
        let storage: ObjectStorage<Payload> = ObjectStorage::new(
            Arc::clone(&backend) as Arc<dyn KvBackend>,
            0,
            CacheConfig { cache_time: Duration::from_secs(3600), leak_detection: None },
        );
        let key = hash(6);

        let (handle, _) =
            storage.compute_if_absent(&key, |key| Payload { hash: *key, value: 0 }).unwrap();
        handle.modify(|payload| payload.value = 99);
        assert!(backend.is_empty(0), "nothing persisted before flush");

        storage.flush().unwrap();
        assert_eq!(backend.len(0), 1);

        drop(handle);
        let reloaded = storage.load(&key).unwrap().expect("persisted");
        assert_eq!(reloaded.get().value, 99);
    }

    #[test]
    fn delete_removes_cache_and_backend() {
        let storage = storage(Duration::from_secs(3600));
        let key = hash(7);

        let (handle, _) =
            storage.compute_if_absent(&key, |key| Payload { hash: *key, value: 1 }).unwrap();
        storage.flush().unwrap();
        drop(handle);

        assert!(storage.delete(&key).unwrap());
        assert!(!storage.contains(&key).unwrap());
        assert!(storage.load(&key).unwrap().is_none());
        assert!(!storage.delete(&key).unwrap());
    }

    #[test]
    fn for_each_key_sees_only_persisted() {
        let storage = storage(Duration::from_secs(3600));

        let (cached_only, _) =
            storage.compute_if_absent(&hash(8), |key| Payload { hash: *key, value: 1 }).unwrap();

        let mut visited = Vec::new();
        storage
            .for_each_key(|key| {
                visited.push(*key);
                true
            })
            .unwrap();
        assert!(visited.is_empty(), "cache-only entries are skipped");

        storage.flush().unwrap();
        storage
            .for_each_key(|key| {
                visited.push(*key);
                true
            })
            .unwrap();
        assert_eq!(visited, vec![hash(8)]);
        drop(cached_only);
    }

    #[test]
    fn operations_fail_after_shutdown() {
        let storage = storage(Duration::from_secs(3600));
        let key = hash(10);

        let (handle, _) =
            storage.compute_if_absent(&key, |key| Payload { hash: *key, value: 1 }).unwrap();
        drop(handle);

        storage.shutdown().unwrap();
        assert!(matches!(storage.load(&key), Err(TangleError::Shutdown)));
        assert!(matches!(storage.contains(&key), Err(TangleError::Shutdown)));
        assert!(matches!(
            storage.compute_if_absent(&key, |key| Payload { hash: *key, value: 2 }),
            Err(TangleError::Shutdown)
        ));
        assert!(matches!(storage.flush(), Err(TangleError::Shutdown)));
    }

    #[test]
    fn shutdown_persists_dirty_entries() {
        let backend = Arc::new(MemoryBackend::new());
        let storage: ObjectStorage<Payload> = ObjectStorage::new(
            Arc::clone(&backend) as Arc<dyn KvBackend>,
            0,
            CacheConfig { cache_time: Duration::from_secs(3600), leak_detection: None },
        );

        let (handle, _) =
            storage.compute_if_absent(&hash(11), |key| Payload { hash: *key, value: 1 }).unwrap();
        drop(handle);

        storage.shutdown().unwrap();
        assert_eq!(backend.len(0), 1);
    }

    #[test]
    fn concurrent_compute_if_absent_single_winner() {
        use std::thread;

        let storage = Arc::new(storage(Duration::from_secs(3600)));
        let key = hash(12);
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = Arc::clone(&storage);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    let (handle, created) = storage
                        .compute_if_absent(&key, |key| Payload { hash: *key, value: 77 })
                        .unwrap();
                    if created {
                        winners.fetch_add(1, Ordering::AcqRel);
                    }
                    assert_eq!(handle.get().value, 77);
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        assert_eq!(winners.load(Ordering::Acquire), 1);
    }
}

//! The transaction/metadata twin store.
//!
//! A transaction exists in the logical store iff BOTH its body and its
//! metadata exist. The twin invariant is maintained on installation: the
//! metadata space is written first (existence is checked via the body, so a
//! body without metadata must never be observable), and metadata found
//! without a body is reset before the body is installed.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLockReadGuard;
use weft_store::KvBackend;
use weft_types::{CacheConfig, TxHash};

use crate::error::Result;
use crate::metadata::TransactionMetadata;
use crate::object_storage::{CachedObject, ObjectStorage};
use crate::transaction::Transaction;

/// Key-space prefix for transaction bodies.
pub const SPACE_TRANSACTIONS: u8 = 0;
/// Key-space prefix for transaction metadata.
pub const SPACE_TRANSACTION_METADATA: u8 = 1;

/// A pinned handle on transaction metadata alone.
pub type CachedMetadata = CachedObject<TransactionMetadata>;

/// A pinned handle on a transaction body/metadata pair.
///
/// Both halves carry their own pin and are released together when the pair
/// is dropped (or force-released).
#[derive(Debug)]
pub struct CachedTransaction {
    tx: CachedObject<Transaction>,
    metadata: CachedMetadata,
}

impl CachedTransaction {
    /// Read access to the transaction body.
    pub fn transaction(&self) -> RwLockReadGuard<'_, Transaction> {
        self.tx.get()
    }

    /// Read access to the metadata.
    pub fn metadata(&self) -> RwLockReadGuard<'_, TransactionMetadata> {
        self.metadata.get()
    }

    /// Mutates the metadata and marks it for write-back.
    pub fn modify_metadata(&self, f: impl FnOnce(&mut TransactionMetadata)) {
        self.metadata.modify(f);
    }

    /// The transaction hash.
    pub fn hash(&self) -> &TxHash {
        self.tx.key()
    }

    /// Acquires an additional pin on both halves.
    pub fn retain(&self) -> CachedTransaction {
        CachedTransaction { tx: self.tx.retain(), metadata: self.metadata.retain() }
    }

    /// Releases both pins without waiting out the cache-time linger.
    pub fn release_force(self) {
        let Self { tx, metadata } = self;
        tx.release_force();
        metadata.release_force();
    }

    /// Runs `f` with borrowed references to both halves, then
    /// force-releases. Release happens on every exit path.
    pub fn consume<R>(self, f: impl FnOnce(&Transaction, &TransactionMetadata) -> R) -> R {
        let Self { tx, metadata } = self;
        tx.consume(|transaction| metadata.consume(|meta| f(transaction, meta)))
    }
}

/// A collection of pair handles that retains and releases as a unit.
#[derive(Debug, Default)]
pub struct CachedTransactions(pub Vec<CachedTransaction>);

impl CachedTransactions {
    /// Returns a new collection of individually retained handles.
    pub fn retain(&self) -> CachedTransactions {
        CachedTransactions(self.0.iter().map(CachedTransaction::retain).collect())
    }

    /// Force-releases every handle in the collection.
    pub fn release_force(self) {
        for cached in self.0 {
            cached.release_force();
        }
    }
}

impl Deref for CachedTransactions {
    type Target = [CachedTransaction];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The twin store: transaction bodies and metadata in two parallel spaces
/// keyed by the same 49-byte hash.
pub struct Tangle {
    transactions: ObjectStorage<Transaction>,
    metadata: ObjectStorage<TransactionMetadata>,
}

impl Tangle {
    /// Creates the twin store over `backend` with the given cache settings.
    pub fn new(backend: Arc<dyn KvBackend>, config: CacheConfig) -> Self {
        Self {
            transactions: ObjectStorage::new(
                Arc::clone(&backend),
                SPACE_TRANSACTIONS,
                config.clone(),
            ),
            metadata: ObjectStorage::new(backend, SPACE_TRANSACTION_METADATA, config),
        }
    }

    /// Whether a transaction body exists for `hash`.
    ///
    /// Consults only the body space and does not affect reference counts.
    ///
    /// # Errors
    ///
    /// Fails after shutdown or on backend failure.
    pub fn contains(&self, hash: &TxHash) -> Result<bool> {
        self.transactions.contains(hash)
    }

    /// Loads the body/metadata pair for `hash`.
    ///
    /// Returns `None` if either half is missing (any half-acquired pin is
    /// released internally).
    ///
    /// # Errors
    ///
    /// Fails after shutdown, on backend failure, or on a corrupt payload.
    pub fn load(&self, hash: &TxHash) -> Result<Option<CachedTransaction>> {
        let Some(tx) = self.transactions.load(hash)? else {
            return Ok(None);
        };
        let Some(metadata) = self.metadata.load(hash)? else {
            tx.release_force();
            return Ok(None);
        };
        Ok(Some(CachedTransaction { tx, metadata }))
    }

    /// Loads the metadata half alone.
    ///
    /// # Errors
    ///
    /// Fails after shutdown, on backend failure, or on a corrupt payload.
    pub fn load_metadata(&self, hash: &TxHash) -> Result<Option<CachedMetadata>> {
        self.metadata.load(hash)
    }

    /// Installs a transaction unless it already exists.
    ///
    /// Returns the pair handle and whether the body was newly added. Under
    /// concurrent calls for the same hash exactly one caller observes
    /// `true`, and all callers' handles resolve to the same entities.
    ///
    /// # Errors
    ///
    /// Fails after shutdown, on backend failure, or on a corrupt payload.
    pub fn store_if_absent(&self, transaction: Transaction) -> Result<(CachedTransaction, bool)> {
        let hash = *transaction.hash();

        // Metadata first: pair existence is checked via the body, so a body
        // without metadata must never be observable.
        let (metadata, newly_added_metadata) =
            self.metadata.compute_if_absent(&hash, |key| TransactionMetadata::new(*key))?;

        let (tx, newly_added) = self.transactions.compute_if_absent(&hash, |_| {
            if !newly_added_metadata {
                // Metadata was known but the body was missing: stale by the
                // twin invariant, reset before installing the body.
                metadata.modify(|meta| meta.reset());
            }
            transaction
        })?;

        Ok((CachedTransaction { tx, metadata }, newly_added))
    }

    /// Removes the transaction from both spaces.
    ///
    /// # Errors
    ///
    /// Fails after shutdown or on backend failure.
    pub fn delete(&self, hash: &TxHash) -> Result<()> {
        self.transactions.delete(hash)?;
        self.metadata.delete(hash)?;
        Ok(())
    }

    /// Visits every persisted transaction.
    ///
    /// For each persisted body key, the body handle and the metadata handle
    /// (which may be absent) are passed borrowed to `cb`; both are released
    /// when `cb` returns. `cb` returns `true` to continue, `false` to stop.
    ///
    /// # Errors
    ///
    /// Fails after shutdown, on backend failure, or on a corrupt payload.
    pub fn for_each(
        &self,
        mut cb: impl FnMut(&CachedObject<Transaction>, Option<&CachedMetadata>) -> bool,
    ) -> Result<()> {
        let mut keys = Vec::new();
        self.transactions.for_each_key(|key| {
            keys.push(*key);
            true
        })?;

        for key in keys {
            // The body may have been deleted since the key was observed.
            let Some(tx) = self.transactions.load(&key)? else {
                continue;
            };
            let metadata = self.metadata.load(&key)?;
            let keep_going = cb(&tx, metadata.as_ref());
            if !keep_going {
                break;
            }
        }
        Ok(())
    }

    /// Visits every persisted body key. Cache-only entries are skipped.
    ///
    /// # Errors
    ///
    /// Fails after shutdown or on backend failure.
    pub fn for_each_key(&self, cb: impl FnMut(&TxHash) -> bool) -> Result<()> {
        self.transactions.for_each_key(cb)
    }

    /// Writes back all dirty entries in both spaces and flushes the backend.
    ///
    /// # Errors
    ///
    /// Fails after shutdown or if a write-back fails.
    pub fn flush(&self) -> Result<()> {
        self.transactions.flush()?;
        self.metadata.flush()
    }

    /// Flushes and shuts down both spaces; all further operations fail.
    ///
    /// # Errors
    ///
    /// Fails if already shut down or if the final flush fails.
    pub fn shutdown(&self) -> Result<()> {
        self.transactions.shutdown()?;
        self.metadata.shutdown()
    }
}

impl std::fmt::Debug for Tangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tangle")
            .field("transactions", &self.transactions)
            .field("metadata", &self.metadata)
            .finish()
    }
}

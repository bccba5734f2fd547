//! Per-transaction metadata: solidity and confirmation state.

use weft_types::{CodecError, MilestoneIndex, TxHash};

use crate::storable::Storable;

/// Mutable metadata tracked alongside a transaction body.
///
/// Metadata exists iff its body exists; a metadata record found without a
/// body is stale and gets [`reset`](Self::reset) before the body is
/// reinstalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMetadata {
    hash: TxHash,
    solid: bool,
    confirmed: Option<MilestoneIndex>,
    solidification_timestamp: u64,
}

impl TransactionMetadata {
    /// Creates default metadata for a transaction hash.
    pub fn new(hash: TxHash) -> Self {
        Self { hash, solid: false, confirmed: None, solidification_timestamp: 0 }
    }

    /// The transaction hash, which is also the storage key.
    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    /// Whether the transaction's entire past cone is known.
    pub fn is_solid(&self) -> bool {
        self.solid
    }

    /// Marks the transaction solid, recording when it happened.
    pub fn set_solid(&mut self, timestamp: u64) {
        self.solid = true;
        self.solidification_timestamp = timestamp;
    }

    /// The milestone that confirmed this transaction, if any.
    pub fn confirmed(&self) -> Option<MilestoneIndex> {
        self.confirmed
    }

    /// Records the confirming milestone.
    pub fn set_confirmed(&mut self, milestone: MilestoneIndex) {
        self.confirmed = Some(milestone);
    }

    /// Seconds-since-epoch at which the transaction became solid (0 if not
    /// solid).
    pub fn solidification_timestamp(&self) -> u64 {
        self.solidification_timestamp
    }

    /// Restores all fields to their defaults, keeping the hash.
    pub fn reset(&mut self) {
        self.solid = false;
        self.confirmed = None;
        self.solidification_timestamp = 0;
    }
}

impl Storable for TransactionMetadata {
    fn from_key_and_bytes(key: &TxHash, bytes: &[u8]) -> Result<Self, CodecError> {
        let (solid, confirmed, solidification_timestamp): (bool, Option<u32>, u64) =
            weft_types::decode(bytes)?;
        Ok(Self {
            hash: *key,
            solid,
            confirmed: confirmed.map(MilestoneIndex),
            solidification_timestamp,
        })
    }

    fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        weft_types::encode(&(
            self.solid,
            self.confirmed.map(|milestone| milestone.0),
            self.solidification_timestamp,
        ))
    }
}

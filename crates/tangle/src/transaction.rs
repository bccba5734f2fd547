//! The transaction body entity.

use weft_types::{CodecError, TxHash};

use crate::storable::Storable;

/// A transaction as stored in the tangle.
///
/// The body bytes are opaque to the store; validation and interpretation
/// happen elsewhere in the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    hash: TxHash,
    payload: Vec<u8>,
}

impl Transaction {
    /// Creates a transaction from its hash and raw body bytes.
    pub fn new(hash: TxHash, payload: Vec<u8>) -> Self {
        Self { hash, payload }
    }

    /// The transaction hash, which is also its storage key.
    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    /// The raw body bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl Storable for Transaction {
    fn from_key_and_bytes(key: &TxHash, bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(Self { hash: *key, payload: weft_types::decode(bytes)? })
    }

    fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        weft_types::encode(&self.payload)
    }
}

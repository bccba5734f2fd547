//! The contract between cached objects and their persisted form.

use weft_types::{CodecError, TxHash};

/// An object that can live in an [`ObjectStorage`](crate::ObjectStorage)
/// space.
///
/// The storage key is carried outside the encoded payload: `to_bytes`
/// produces only the value bytes, and `from_key_and_bytes` rebuilds the
/// object from the key it was stored under plus those bytes.
pub trait Storable: Sized + Send + Sync + 'static {
    /// Rebuilds an object from its storage key and persisted payload.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the payload cannot be decoded.
    fn from_key_and_bytes(key: &TxHash, bytes: &[u8]) -> Result<Self, CodecError>;

    /// Encodes the object's payload for persistence.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the payload cannot be encoded.
    fn to_bytes(&self) -> Result<Vec<u8>, CodecError>;
}

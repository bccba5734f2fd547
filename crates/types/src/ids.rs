//! Fixed-width identifier types shared across the node.
//!
//! All identifiers serialize to an exact number of bytes with no framing;
//! multi-byte integers inside composite identifiers are little-endian.

use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Error returned when an identifier is built from a wrong-sized slice.
#[derive(Debug, Snafu)]
#[snafu(display("invalid identifier length: expected {expected} bytes, got {got}"))]
pub struct InvalidLength {
    /// The required byte length.
    pub expected: usize,
    /// The length that was supplied.
    pub got: usize,
}

fn fmt_hex(f: &mut fmt::Formatter<'_>, name: &str, bytes: &[u8]) -> fmt::Result {
    write!(f, "{name}(")?;
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    write!(f, ")")
}

/// Identifier of a message in the DAG (32 bytes).
///
/// Solid entry points are message identifiers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId([u8; Self::LENGTH]);

impl MessageId {
    /// Serialized length in bytes.
    pub const LENGTH: usize = 32;

    /// Creates a message identifier from its raw bytes.
    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    /// Creates a message identifier from a slice, validating the length.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLength`] if the slice is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidLength> {
        let bytes: [u8; Self::LENGTH] = bytes
            .try_into()
            .map_err(|_| InvalidLength { expected: Self::LENGTH, got: bytes.len() })?;
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for MessageId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(f, "MessageId", &self.0)
    }
}

/// Identifier of a ledger transaction (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId([u8; Self::LENGTH]);

impl TransactionId {
    /// Serialized length in bytes.
    pub const LENGTH: usize = 32;

    /// Creates a transaction identifier from its raw bytes.
    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    /// Creates a transaction identifier from a slice, validating the length.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLength`] if the slice is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidLength> {
        let bytes: [u8; Self::LENGTH] = bytes
            .try_into()
            .map_err(|_| InvalidLength { expected: Self::LENGTH, got: bytes.len() })?;
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for TransactionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(f, "TransactionId", &self.0)
    }
}

/// Identifier of a ledger output (34 bytes).
///
/// Layout: `TransactionId (32 B) || output index (u16 LE)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId([u8; Self::LENGTH]);

impl OutputId {
    /// Serialized length in bytes.
    pub const LENGTH: usize = TransactionId::LENGTH + 2;

    /// Creates an output identifier from a transaction identifier and index.
    pub fn new(transaction_id: TransactionId, index: u16) -> Self {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[0..TransactionId::LENGTH].copy_from_slice(transaction_id.as_bytes());
        bytes[TransactionId::LENGTH..].copy_from_slice(&index.to_le_bytes());
        Self(bytes)
    }

    /// Creates an output identifier from a slice, validating the length.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLength`] if the slice is not exactly 34 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidLength> {
        let bytes: [u8; Self::LENGTH] = bytes
            .try_into()
            .map_err(|_| InvalidLength { expected: Self::LENGTH, got: bytes.len() })?;
        Ok(Self(bytes))
    }

    /// The transaction that created this output.
    pub fn transaction_id(&self) -> TransactionId {
        let mut bytes = [0u8; TransactionId::LENGTH];
        bytes.copy_from_slice(&self.0[0..TransactionId::LENGTH]);
        TransactionId::new(bytes)
    }

    /// The index of this output within its transaction.
    pub fn index(&self) -> u16 {
        u16::from_le_bytes([self.0[TransactionId::LENGTH], self.0[TransactionId::LENGTH + 1]])
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for OutputId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(f, "OutputId", &self.0)
    }
}

/// Binary transaction hash used as the object-store key (49 bytes).
///
/// This is the binary derivation of the trinary transaction hash; its
/// internal structure is opaque to the store, only the fixed width matters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash([u8; Self::LENGTH]);

impl TxHash {
    /// Serialized length in bytes.
    pub const LENGTH: usize = 49;

    /// Creates a hash from its raw bytes.
    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    /// Creates a hash from a slice, validating the length.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLength`] if the slice is not exactly 49 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidLength> {
        let bytes: [u8; Self::LENGTH] = bytes
            .try_into()
            .map_err(|_| InvalidLength { expected: Self::LENGTH, got: bytes.len() })?;
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for TxHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(f, "TxHash", &self.0)
    }
}

/// Index of a coordinator-issued milestone (u32, little-endian on the wire).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MilestoneIndex(pub u32);

impl MilestoneIndex {
    /// Serialized length in bytes.
    pub const LENGTH: usize = 4;

    /// Serializes to little-endian bytes.
    pub const fn to_le_bytes(self) -> [u8; Self::LENGTH] {
        self.0.to_le_bytes()
    }

    /// Deserializes from little-endian bytes.
    pub const fn from_le_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for MilestoneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for MilestoneIndex {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_from_slice_validates_length() {
        assert!(MessageId::from_slice(&[0u8; 32]).is_ok());
        let err = MessageId::from_slice(&[0u8; 31]).unwrap_err();
        assert_eq!(err.expected, 32);
        assert_eq!(err.got, 31);
    }

    #[test]
    fn output_id_round_trips_components() {
        let tx_id = TransactionId::new([0xAB; 32]);
        let output_id = OutputId::new(tx_id, 513);
        assert_eq!(output_id.transaction_id(), tx_id);
        assert_eq!(output_id.index(), 513);
        // index is little-endian in the trailing two bytes
        assert_eq!(output_id.as_bytes()[32], 0x01);
        assert_eq!(output_id.as_bytes()[33], 0x02);
    }

    #[test]
    fn output_id_from_slice_round_trip() {
        let original = OutputId::new(TransactionId::new([7u8; 32]), 42);
        let parsed = OutputId::from_slice(original.as_bytes()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn tx_hash_length_is_49() {
        assert_eq!(TxHash::LENGTH, 49);
        assert!(TxHash::from_slice(&[1u8; 49]).is_ok());
        assert!(TxHash::from_slice(&[1u8; 48]).is_err());
        assert!(TxHash::from_slice(&[1u8; 50]).is_err());
    }

    #[test]
    fn milestone_index_little_endian() {
        let index = MilestoneIndex(0x0403_0201);
        assert_eq!(index.to_le_bytes(), [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(MilestoneIndex::from_le_bytes([0x01, 0x02, 0x03, 0x04]), index);
    }

    #[test]
    fn debug_renders_hex() {
        let id = MessageId::new([0xFF; 32]);
        let debug = format!("{id:?}");
        assert!(debug.starts_with("MessageId(ffff"));
    }
}

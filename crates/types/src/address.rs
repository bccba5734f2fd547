//! Type-tagged address codec.
//!
//! Addresses serialize as a one-byte kind tag followed by the kind-specific
//! payload. Ed25519 is the only defined kind: tag `0x00` plus 32 key bytes,
//! 33 bytes total.

use std::fmt;

use snafu::Snafu;

/// Kind tag for Ed25519 addresses.
pub const ADDRESS_KIND_ED25519: u8 = 0;

/// Errors produced while decoding an address.
#[derive(Debug, Snafu)]
pub enum AddressError {
    /// The kind tag does not identify a known address variant.
    #[snafu(display("unknown address kind: {kind}"))]
    UnknownKind {
        /// The unrecognized tag byte.
        kind: u8,
    },

    /// The serialized address is shorter than its kind requires.
    #[snafu(display("invalid address length: expected {expected} bytes, got {got}"))]
    InvalidLength {
        /// The required byte length.
        expected: usize,
        /// The length that was supplied.
        got: usize,
    },
}

/// A ledger address, discriminated by a leading kind tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// An Ed25519 public-key address.
    Ed25519([u8; 32]),
}

impl Address {
    /// Serialized length in bytes (tag plus Ed25519 key).
    pub const SERIALIZED_LENGTH: usize = 33;

    /// The kind tag of this address.
    pub const fn kind(&self) -> u8 {
        match self {
            Self::Ed25519(_) => ADDRESS_KIND_ED25519,
        }
    }

    /// Serializes the address to its tagged wire form.
    pub fn to_bytes(&self) -> [u8; Self::SERIALIZED_LENGTH] {
        let mut bytes = [0u8; Self::SERIALIZED_LENGTH];
        match self {
            Self::Ed25519(key) => {
                bytes[0] = ADDRESS_KIND_ED25519;
                bytes[1..].copy_from_slice(key);
            },
        }
        bytes
    }

    /// Deserializes an address from its tagged wire form.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidLength`] on a short buffer and
    /// [`AddressError::UnknownKind`] on an unrecognized tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        let Some((&kind, payload)) = bytes.split_first() else {
            return Err(AddressError::InvalidLength {
                expected: Self::SERIALIZED_LENGTH,
                got: 0,
            });
        };
        match kind {
            ADDRESS_KIND_ED25519 => {
                let key: [u8; 32] = payload.try_into().map_err(|_| {
                    AddressError::InvalidLength {
                        expected: Self::SERIALIZED_LENGTH,
                        got: bytes.len(),
                    }
                })?;
                Ok(Self::Ed25519(key))
            },
            kind => Err(AddressError::UnknownKind { kind }),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519(key) => {
                write!(f, "Ed25519(")?;
                for b in key {
                    write!(f, "{b:02x}")?;
                }
                write!(f, ")")
            },
        }
    }
}

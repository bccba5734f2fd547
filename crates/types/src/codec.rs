//! Value serialization for objects persisted through the key/value backend.
//!
//! Object payloads are encoded with postcard; the snapshot file format does
//! not go through this module (it is byte-exact and hand-encoded).

use serde::{Serialize, de::DeserializeOwned};
use snafu::Snafu;

/// Error type for value codec operations.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// Encoding failed.
    #[snafu(display("encoding failed: {source}"))]
    Encode {
        /// The underlying postcard error.
        source: postcard::Error,
    },

    /// Decoding failed.
    #[snafu(display("decoding failed: {source}"))]
    Decode {
        /// The underlying postcard error.
        source: postcard::Error,
    },
}

/// Encodes a value to bytes.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|source| CodecError::Encode { source })
}

/// Decodes bytes to a value.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if deserialization fails.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|source| CodecError::Decode { source })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct MetadataLike {
        solid: bool,
        confirmed: Option<u32>,
        timestamp: u64,
    }

    #[test]
    fn round_trip_struct() {
        let original =
            MetadataLike { solid: true, confirmed: Some(1234), timestamp: 1_600_000_000 };
        let bytes = encode(&original).expect("encode");
        let decoded: MetadataLike = decode(&bytes).expect("decode");
        assert_eq!(decoded, original);
    }

    #[test]
    fn round_trip_opaque_payload() {
        let payload: Vec<u8> = (0u8..255).collect();
        let bytes = encode(&payload).expect("encode");
        let decoded: Vec<u8> = decode(&bytes).expect("decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn truncated_input_fails() {
        let bytes = encode(&MetadataLike { solid: false, confirmed: None, timestamp: u64::MAX })
            .expect("encode");
        let result: Result<MetadataLike, _> = decode(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn empty_input_fails() {
        let result: Result<u64, _> = decode(&[]);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }
}

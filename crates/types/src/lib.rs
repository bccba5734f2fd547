//! Core types for the weft DAG-ledger node.
//!
//! This crate provides the foundational types used throughout the node:
//! - Fixed-width identifiers (message, transaction, output, milestone)
//! - The type-tagged address codec
//! - Value serialization helpers for the key/value layer
//! - Configuration types validated at construction time

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod codec;
pub mod config;
pub mod ids;

// Re-export commonly used types at crate root
pub use address::{ADDRESS_KIND_ED25519, Address, AddressError};
pub use codec::{CodecError, decode, encode};
pub use config::{
    CacheConfig, ConfigError, LeakDetectionConfig, PowConfig, SnapshotConfig,
};
pub use ids::{InvalidLength, MessageId, MilestoneIndex, OutputId, TransactionId, TxHash};

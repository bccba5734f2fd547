//! The fixed-size snapshot file header.
//!
//! Layout (all integers little-endian):
//!
//! | field                  | bytes |
//! |------------------------|-------|
//! | kind                   | 1     |
//! | version                | 1     |
//! | timestamp              | 8     |
//! | network id             | 8     |
//! | SEP milestone index    | 4     |
//! | ledger milestone index | 4     |
//! | SEP count              | 8     |
//! | output count           | 8     |
//! | milestone diff count   | 8     |

use weft_types::MilestoneIndex;

use crate::error::{Result, SnapshotError};

/// The single snapshot format version this implementation reads and writes.
pub const SUPPORTED_FORMAT_VERSION: u8 = 1;

/// Serialized header length in bytes.
pub const HEADER_LENGTH: usize = 50;

/// Whether a snapshot carries the full ledger state or a delta over a prior
/// full snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SnapshotKind {
    /// Self-contained state: SEPs, outputs, and diffs.
    Full = 0,
    /// Incremental state: SEPs and diffs only.
    Delta = 1,
}

impl TryFrom<u8> for SnapshotKind {
    type Error = SnapshotError;

    fn try_from(kind: u8) -> Result<Self> {
        match kind {
            0 => Ok(Self::Full),
            1 => Ok(Self::Delta),
            kind => Err(SnapshotError::InvalidSnapshotKind { kind }),
        }
    }
}

/// The caller-supplied part of a snapshot file header.
///
/// The timestamp and the three section counts are managed by the producer
/// and surface on read as part of [`ReadFileHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Full or delta.
    pub kind: SnapshotKind,
    /// Format version; must equal [`SUPPORTED_FORMAT_VERSION`].
    pub version: u8,
    /// Opaque network identity tag.
    pub network_id: u64,
    /// Milestone at which the solid entry points are valid.
    pub sep_milestone_index: MilestoneIndex,
    /// Ledger cutoff (full) or base (delta) milestone.
    pub ledger_milestone_index: MilestoneIndex,
}

/// A fully parsed header as read back from a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFileHeader {
    /// The caller-supplied header fields.
    pub header: FileHeader,
    /// Seconds since epoch at which the snapshot was produced.
    pub timestamp: u64,
    /// Number of solid entry points in the file.
    pub sep_count: u64,
    /// Number of outputs in the file (0 for delta snapshots).
    pub output_count: u64,
    /// Number of milestone diffs in the file.
    pub ms_diff_count: u64,
}

impl ReadFileHeader {
    /// Serializes the header to its fixed wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut buf = [0u8; HEADER_LENGTH];
        buf[0] = self.header.kind as u8;
        buf[1] = self.header.version;
        buf[2..10].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[10..18].copy_from_slice(&self.header.network_id.to_le_bytes());
        buf[18..22].copy_from_slice(&self.header.sep_milestone_index.to_le_bytes());
        buf[22..26].copy_from_slice(&self.header.ledger_milestone_index.to_le_bytes());
        buf[26..34].copy_from_slice(&self.sep_count.to_le_bytes());
        buf[34..42].copy_from_slice(&self.output_count.to_le_bytes());
        buf[42..50].copy_from_slice(&self.ms_diff_count.to_le_bytes());
        buf
    }

    /// Parses and validates a header from its fixed wire form.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::UnsupportedVersion`] on a version mismatch,
    /// [`SnapshotError::InvalidSnapshotKind`] on a bad kind discriminant,
    /// and [`SnapshotError::DeltaWithOutputs`] if a delta header declares a
    /// non-zero output count.
    pub fn from_bytes(buf: &[u8; HEADER_LENGTH]) -> Result<Self> {
        let kind = SnapshotKind::try_from(buf[0])?;
        let version = buf[1];
        if version != SUPPORTED_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion { version });
        }

        let timestamp = u64::from_le_bytes(buf[2..10].try_into().expect("slice length is 8"));
        let network_id = u64::from_le_bytes(buf[10..18].try_into().expect("slice length is 8"));
        let sep_milestone_index =
            MilestoneIndex::from_le_bytes(buf[18..22].try_into().expect("slice length is 4"));
        let ledger_milestone_index =
            MilestoneIndex::from_le_bytes(buf[22..26].try_into().expect("slice length is 4"));
        let sep_count = u64::from_le_bytes(buf[26..34].try_into().expect("slice length is 8"));
        let output_count = u64::from_le_bytes(buf[34..42].try_into().expect("slice length is 8"));
        let ms_diff_count = u64::from_le_bytes(buf[42..50].try_into().expect("slice length is 8"));

        if kind == SnapshotKind::Delta && output_count != 0 {
            return Err(SnapshotError::DeltaWithOutputs { count: output_count });
        }

        Ok(Self {
            header: FileHeader {
                kind,
                version,
                network_id,
                sep_milestone_index,
                ledger_milestone_index,
            },
            timestamp,
            sep_count,
            output_count,
            ms_diff_count,
        })
    }
}

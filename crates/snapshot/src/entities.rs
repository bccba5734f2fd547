//! Wire codecs for the entities carried in a snapshot file.
//!
//! All entities serialize to fixed or count-prefixed layouts with
//! little-endian integers:
//!
//! - `Output` — output id (34 B) || address (33 B) || amount (u64)
//! - `Spent` — `Output` || target transaction id (32 B)
//! - `MilestoneDiff` — index (u32) || created count (u32) || outputs ||
//!   consumed count (u32) || spents

use std::io::{self, Read, Write};

use snafu::ResultExt;
use weft_types::{Address, MilestoneIndex, OutputId, TransactionId};

use crate::error::{AddressSnafu, Result, SnapshotError};

pub(crate) const SECTION_HEADER: &str = "header";
pub(crate) const SECTION_SEPS: &str = "solid entry points";
pub(crate) const SECTION_OUTPUTS: &str = "outputs";
pub(crate) const SECTION_MS_DIFFS: &str = "milestone diffs";

/// Reads exactly `buf.len()` bytes, mapping a premature end of file to
/// [`SnapshotError::Truncated`] for the given section.
pub(crate) fn read_exact_or(
    source: &mut impl Read,
    buf: &mut [u8],
    section: &'static str,
) -> Result<()> {
    source.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => SnapshotError::Truncated { section },
        _ => SnapshotError::Io { source: err },
    })
}

/// An unspent ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    /// Unique identifier of the output.
    pub output_id: OutputId,
    /// The address owning the funds.
    pub address: Address,
    /// The amount in base tokens.
    pub amount: u64,
}

impl Output {
    /// Serialized length in bytes.
    pub const LENGTH: usize = OutputId::LENGTH + Address::SERIALIZED_LENGTH + 8;

    /// Writes the output to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] on sink failure.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(self.output_id.as_bytes())?;
        sink.write_all(&self.address.to_bytes())?;
        sink.write_all(&self.amount.to_le_bytes())?;
        Ok(())
    }

    /// Reads an output from `source`, attributing truncation to `section`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Truncated`] on a short read and
    /// [`SnapshotError::Address`] on an unknown address tag.
    pub fn read_from<R: Read>(source: &mut R, section: &'static str) -> Result<Self> {
        let mut output_id = [0u8; OutputId::LENGTH];
        read_exact_or(source, &mut output_id, section)?;
        let output_id = OutputId::from_slice(&output_id).expect("buffer length matches");

        let mut address = [0u8; Address::SERIALIZED_LENGTH];
        read_exact_or(source, &mut address, section)?;
        let address = Address::from_bytes(&address).context(AddressSnafu)?;

        let mut amount = [0u8; 8];
        read_exact_or(source, &mut amount, section)?;
        let amount = u64::from_le_bytes(amount);

        Ok(Self { output_id, address, amount })
    }
}

/// A consumed output, tagged with the transaction that spent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spent {
    /// The output that was consumed.
    pub output: Output,
    /// The transaction that consumed it.
    pub target_transaction_id: TransactionId,
}

impl Spent {
    /// Serialized length in bytes.
    pub const LENGTH: usize = Output::LENGTH + TransactionId::LENGTH;

    /// Writes the spent entry to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] on sink failure.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        self.output.write_to(sink)?;
        sink.write_all(self.target_transaction_id.as_bytes())?;
        Ok(())
    }

    /// Reads a spent entry from `source`, attributing truncation to
    /// `section`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Output::read_from`].
    pub fn read_from<R: Read>(source: &mut R, section: &'static str) -> Result<Self> {
        let output = Output::read_from(source, section)?;
        let mut target = [0u8; TransactionId::LENGTH];
        read_exact_or(source, &mut target, section)?;
        Ok(Self { output, target_transaction_id: TransactionId::new(target) })
    }
}

/// The outputs created and consumed at one milestone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneDiff {
    /// The milestone this diff belongs to.
    pub milestone_index: MilestoneIndex,
    /// Outputs created at this milestone.
    pub created: Vec<Output>,
    /// Outputs consumed at this milestone.
    pub consumed: Vec<Spent>,
}

impl MilestoneDiff {
    /// Writes the diff to `sink`: index, created count and outputs, then
    /// consumed count and spents.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::CountOverflow`] if either list exceeds the
    /// u32 wire format and [`SnapshotError::Io`] on sink failure.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(&self.milestone_index.to_le_bytes())?;

        let created_count = u32::try_from(self.created.len())
            .map_err(|_| SnapshotError::CountOverflow { count: self.created.len() })?;
        sink.write_all(&created_count.to_le_bytes())?;
        for output in &self.created {
            output.write_to(sink)?;
        }

        let consumed_count = u32::try_from(self.consumed.len())
            .map_err(|_| SnapshotError::CountOverflow { count: self.consumed.len() })?;
        sink.write_all(&consumed_count.to_le_bytes())?;
        for spent in &self.consumed {
            spent.write_to(sink)?;
        }
        Ok(())
    }

    /// Reads a diff from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Truncated`] on a short read and
    /// [`SnapshotError::Address`] on an unknown address tag.
    pub fn read_from<R: Read>(source: &mut R) -> Result<Self> {
        let mut index = [0u8; MilestoneIndex::LENGTH];
        read_exact_or(source, &mut index, SECTION_MS_DIFFS)?;
        let milestone_index = MilestoneIndex::from_le_bytes(index);

        let mut count = [0u8; 4];
        read_exact_or(source, &mut count, SECTION_MS_DIFFS)?;
        let created_count = u32::from_le_bytes(count);
        let mut created = Vec::with_capacity(created_count.min(4096) as usize);
        for _ in 0..created_count {
            created.push(Output::read_from(source, SECTION_MS_DIFFS)?);
        }

        read_exact_or(source, &mut count, SECTION_MS_DIFFS)?;
        let consumed_count = u32::from_le_bytes(count);
        let mut consumed = Vec::with_capacity(consumed_count.min(4096) as usize);
        for _ in 0..consumed_count {
            consumed.push(Spent::read_from(source, SECTION_MS_DIFFS)?);
        }

        Ok(Self { milestone_index, created, consumed })
    }
}

//! Streaming snapshot consumer.
//!
//! The consumer parses the fixed header, then invokes the caller's
//! callbacks for every solid entry point, output, and milestone diff, in
//! file order. Section counts come from the header and are enforced; after
//! the last diff the file must end.

use std::io::Read;

use weft_types::MessageId;

use crate::entities::{
    MilestoneDiff, Output, SECTION_HEADER, SECTION_OUTPUTS, SECTION_SEPS, read_exact_or,
};
use crate::error::{Result, SnapshotError};
use crate::header::{HEADER_LENGTH, ReadFileHeader, SnapshotKind};

/// Reads a snapshot from `source`, invoking a callback per parsed item.
///
/// The header callback runs first, after validation; each section callback
/// then runs once per item in file order. A callback returning an error
/// aborts the parse, and the error is propagated unchanged. Callbacks
/// receive owned values and must not assume anything about parser state
/// between invocations.
///
/// # Errors
///
/// Returns [`SnapshotError::UnsupportedVersion`],
/// [`SnapshotError::InvalidSnapshotKind`], or
/// [`SnapshotError::DeltaWithOutputs`] for a bad header;
/// [`SnapshotError::Truncated`] if the file ends inside a section;
/// [`SnapshotError::TrailingBytes`] if bytes remain after the last diff;
/// [`SnapshotError::Io`] on source failure; and callback errors unchanged.
pub fn read_snapshot<R: Read>(
    source: &mut R,
    mut header_cb: impl FnMut(&ReadFileHeader) -> Result<()>,
    mut sep_cb: impl FnMut(MessageId) -> Result<()>,
    mut output_cb: impl FnMut(Output) -> Result<()>,
    mut ms_diff_cb: impl FnMut(MilestoneDiff) -> Result<()>,
) -> Result<()> {
    let mut header_bytes = [0u8; HEADER_LENGTH];
    read_exact_or(source, &mut header_bytes, SECTION_HEADER)?;
    let header = ReadFileHeader::from_bytes(&header_bytes)?;
    header_cb(&header)?;

    for _ in 0..header.sep_count {
        let mut sep = [0u8; MessageId::LENGTH];
        read_exact_or(source, &mut sep, SECTION_SEPS)?;
        sep_cb(MessageId::new(sep))?;
    }

    if header.header.kind == SnapshotKind::Full {
        for _ in 0..header.output_count {
            output_cb(Output::read_from(source, SECTION_OUTPUTS)?)?;
        }
    }

    for _ in 0..header.ms_diff_count {
        ms_diff_cb(MilestoneDiff::read_from(source)?)?;
    }

    // Strict EOF: a single extra byte is a format error.
    let mut trailing = [0u8; 1];
    match source.read_exact(&mut trailing) {
        Ok(()) => Err(SnapshotError::TrailingBytes),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
        Err(err) => Err(SnapshotError::Io { source: err }),
    }
}

//! Streaming snapshot producer.
//!
//! The producer writes a placeholder header, streams the three sections
//! while counting emissions, then seeks back and patches the final counts
//! into the header. The sink must therefore be seekable; producers are
//! driven exactly once.

use std::io::{Seek, SeekFrom, Write};

use weft_types::MessageId;

use crate::entities::{MilestoneDiff, Output};
use crate::error::{Result, SnapshotError};
use crate::header::{FileHeader, ReadFileHeader, SUPPORTED_FORMAT_VERSION, SnapshotKind};

/// The final section counts of a written snapshot, as patched into its
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenCounts {
    /// Solid entry points written.
    pub sep_count: u64,
    /// Outputs written (always 0 for delta snapshots).
    pub output_count: u64,
    /// Milestone diffs written.
    pub ms_diff_count: u64,
}

/// Writes a snapshot to `sink`, driving each producer to exhaustion.
///
/// Producers yield `Ok(item)` to continue and terminate by ending; an `Err`
/// aborts the write immediately and is propagated unchanged. The partially
/// written file is left as is. For delta snapshots the output producer is
/// never pulled, even when one is supplied.
///
/// Each milestone diff is written whole (created outputs first, then
/// consumed spents) before the next one is pulled. Items appear in the file
/// in exactly the order the producers emitted them.
///
/// # Errors
///
/// Returns [`SnapshotError::UnsupportedVersion`] if the header carries any
/// version other than [`SUPPORTED_FORMAT_VERSION`], [`SnapshotError::Io`] on
/// sink failure, and any producer error unchanged.
pub fn write_snapshot<W, S, O, M>(
    sink: &mut W,
    timestamp: u64,
    header: &FileHeader,
    seps: S,
    outputs: Option<O>,
    ms_diffs: M,
) -> Result<WrittenCounts>
where
    W: Write + Seek,
    S: IntoIterator<Item = Result<MessageId>>,
    O: IntoIterator<Item = Result<Output>>,
    M: IntoIterator<Item = Result<MilestoneDiff>>,
{
    if header.version != SUPPORTED_FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion { version: header.version });
    }

    // Reserve the header region; the counts are patched in at the end.
    let header_offset = sink.stream_position()?;
    let mut written = ReadFileHeader {
        header: *header,
        timestamp,
        sep_count: 0,
        output_count: 0,
        ms_diff_count: 0,
    };
    sink.write_all(&written.to_bytes())?;

    for sep in seps {
        let sep = sep?;
        sink.write_all(sep.as_bytes())?;
        written.sep_count += 1;
    }

    if header.kind == SnapshotKind::Full
        && let Some(outputs) = outputs
    {
        for output in outputs {
            let output = output?;
            output.write_to(sink)?;
            written.output_count += 1;
        }
    }

    for ms_diff in ms_diffs {
        let ms_diff = ms_diff?;
        ms_diff.write_to(sink)?;
        written.ms_diff_count += 1;
    }

    // Patch the real counts into the reserved header region.
    let end_offset = sink.stream_position()?;
    sink.seek(SeekFrom::Start(header_offset))?;
    sink.write_all(&written.to_bytes())?;
    sink.seek(SeekFrom::Start(end_offset))?;
    sink.flush()?;

    Ok(WrittenCounts {
        sep_count: written.sep_count,
        output_count: written.output_count,
        ms_diff_count: written.ms_diff_count,
    })
}

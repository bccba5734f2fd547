//! On-disk snapshot file lifecycle.
//!
//! Snapshot files are named `{ledger_milestone_index:09}.snap` inside a
//! configured directory. The manager lists, locates, and prunes them; the
//! codec in [`write`](crate::write) and [`read`](crate::read) handles the
//! contents.

use std::fs;
use std::path::{Path, PathBuf};

use weft_types::{MilestoneIndex, SnapshotConfig};

use crate::error::{Result, SnapshotError};

/// Builds the file name for a snapshot at the given milestone.
pub fn snapshot_filename(index: MilestoneIndex) -> String {
    format!("{:09}.snap", index.0)
}

/// Parses a milestone index back out of a snapshot file name.
pub fn parse_snapshot_filename(filename: &str) -> Option<MilestoneIndex> {
    filename.strip_suffix(".snap").and_then(|stem| stem.parse().ok()).map(MilestoneIndex)
}

/// Manages the snapshot files of one node.
#[derive(Debug)]
pub struct SnapshotManager {
    snapshot_dir: PathBuf,
    max_snapshots: usize,
}

impl SnapshotManager {
    /// Creates a manager over `snapshot_dir`, retaining at most
    /// `max_snapshots` files after pruning.
    pub fn new(snapshot_dir: PathBuf, max_snapshots: usize) -> Self {
        Self { snapshot_dir, max_snapshots }
    }

    /// Creates a manager over `snapshot_dir` with retention taken from the
    /// snapshot configuration.
    pub fn from_config(snapshot_dir: PathBuf, config: &SnapshotConfig) -> Self {
        Self::new(snapshot_dir, config.max_snapshots)
    }

    /// The managed directory.
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Ensures the snapshot directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the directory cannot be created.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.snapshot_dir)?;
        Ok(())
    }

    /// The path a snapshot at `index` lives at.
    pub fn path_for(&self, index: MilestoneIndex) -> PathBuf {
        self.snapshot_dir.join(snapshot_filename(index))
    }

    /// The path of an existing snapshot at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotFound`] if no file exists there.
    pub fn existing_path_for(&self, index: MilestoneIndex) -> Result<PathBuf> {
        let path = self.path_for(index);
        if !path.exists() {
            return Err(SnapshotError::NotFound { path: path.display().to_string() });
        }
        Ok(path)
    }

    /// Lists the milestone indexes of all snapshot files, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the directory cannot be read.
    pub fn list_snapshots(&self) -> Result<Vec<MilestoneIndex>> {
        if !self.snapshot_dir.exists() {
            return Ok(Vec::new());
        }

        let mut indexes = Vec::new();
        for entry in fs::read_dir(&self.snapshot_dir)? {
            let entry = entry?;
            if let Some(filename) = entry.file_name().to_str()
                && let Some(index) = parse_snapshot_filename(filename)
            {
                indexes.push(index);
            }
        }
        indexes.sort_unstable();
        Ok(indexes)
    }

    /// The most recent snapshot index, if any file exists.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the directory cannot be read.
    pub fn latest(&self) -> Result<Option<MilestoneIndex>> {
        Ok(self.list_snapshots()?.pop())
    }

    /// The most recent snapshot at or before `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the directory cannot be read.
    pub fn find_at_or_before(&self, index: MilestoneIndex) -> Result<Option<MilestoneIndex>> {
        Ok(self.list_snapshots()?.into_iter().rev().find(|&candidate| candidate <= index))
    }

    /// Deletes the oldest snapshot files beyond the retention limit.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if a file cannot be removed.
    pub fn prune(&self) -> Result<()> {
        let snapshots = self.list_snapshots()?;
        if snapshots.len() <= self.max_snapshots {
            return Ok(());
        }

        let to_remove = snapshots.len() - self.max_snapshots;
        for index in snapshots.into_iter().take(to_remove) {
            fs::remove_file(self.path_for(index))?;
        }
        Ok(())
    }
}

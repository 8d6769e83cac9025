//! Durable checkpoint of the last fully-processed commit.
//!
//! A single text file holds the commit id up to which processing is known
//! complete. It is read once at startup (to seed the backfill range) and
//! rewritten after each completed batch, never mid-batch.
//!
//! # Atomicity
//!
//! Saves use write-to-temp-then-rename:
//! 1. Write to `checkpoint.tmp`
//! 2. fsync the temp file
//! 3. Rename to `checkpoint`
//! 4. fsync the directory
//!
//! A crash at any point leaves either the old value or the new value on
//! disk, never a partial write.

pub mod fsync;

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{CommitId, InvalidCommitId};
use fsync::{fsync_dir, fsync_file};

/// File name of the checkpoint within the work directory.
pub const CHECKPOINT_FILE: &str = "checkpoint";

/// Errors from checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The stored value is not a commit id (corruption or manual edit).
    #[error("corrupt checkpoint: {0}")]
    Corrupt(#[from] InvalidCommitId),
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// The durable single-value store for the last processed commit.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Creates a store rooted in the given work directory.
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        CheckpointStore {
            path: work_dir.as_ref().join(CHECKPOINT_FILE),
        }
    }

    /// Returns the path of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpoint.
    ///
    /// Returns `None` only when no checkpoint has ever been written (first
    /// run). A present-but-invalid file is an error, not a silent restart
    /// from scratch.
    pub fn load(&self) -> Result<Option<CommitId>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let id = CommitId::parse(contents.trim())?;
        Ok(Some(id))
    }

    /// Saves the checkpoint atomically.
    ///
    /// Called exactly once per fully-attempted commit range, after every
    /// artifact in its plan has been processed.
    pub fn save(&self, commit: &CommitId) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            writeln!(file, "{}", commit)?;
            fsync_file(&file)?;
        }

        std::fs::rename(&tmp_path, &self.path)?;

        if let Some(parent) = self.path.parent() {
            fsync_dir(parent)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn commit(c: char) -> CommitId {
        CommitId::parse(String::from(c).repeat(40)).unwrap()
    }

    #[test]
    fn load_returns_none_on_first_run() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());

        store.save(&commit('a')).unwrap();
        assert_eq!(store.load().unwrap(), Some(commit('a')));

        store.save(&commit('b')).unwrap();
        assert_eq!(store.load().unwrap(), Some(commit('b')));
    }

    #[test]
    fn load_tolerates_missing_trailing_newline() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CHECKPOINT_FILE), "a".repeat(40)).unwrap();

        let store = CheckpointStore::new(dir.path());
        assert_eq!(store.load().unwrap(), Some(commit('a')));
    }

    #[test]
    fn load_rejects_corrupt_contents() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CHECKPOINT_FILE), "not a commit id").unwrap();

        let store = CheckpointStore::new(dir.path());
        assert!(matches!(
            store.load(),
            Err(CheckpointError::Corrupt(_))
        ));
    }

    #[test]
    fn crash_between_temp_write_and_rename_keeps_prior_value() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());

        store.save(&commit('a')).unwrap();

        // Simulate a crash mid-save: the temp file was written but the
        // rename never happened.
        std::fs::write(store.path().with_extension("tmp"), "b".repeat(40)).unwrap();

        assert_eq!(store.load().unwrap(), Some(commit('a')));
    }

    #[test]
    fn save_creates_missing_work_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("deeper").join("work");
        let store = CheckpointStore::new(&nested);

        store.save(&commit('c')).unwrap();
        assert_eq!(store.load().unwrap(), Some(commit('c')));
    }
}

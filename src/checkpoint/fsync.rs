//! Low-level fsync operations for durability.
//!
//! Both file and directory fsyncs are required for crash safety: renaming a
//! file updates the directory entry, and without a directory fsync that
//! entry may not survive a power loss even when the file contents were
//! synced.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Syncs a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory to disk, ensuring its entries are durable.
///
/// Required after a rename into the directory; without it the rename may
/// revert on crash.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

//! Blocking file helpers shared by the built-in workloads.
//!
//! Every helper maps `std::io::Error` into [`WorkloadError::Io`] tagged with the
//! operation and path, so a failure report always says what was attempted and
//! where. Handles are opened per call and never cached: each action goes
//! through a fresh open, which is part of what the harness exercises.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Evidence, VerifyFailure, WorkloadError, WorkloadResult};

/// Creates (or truncates) `path` and writes `data` to it.
pub fn write_file(path: &Path, data: &[u8]) -> WorkloadResult<()> {
    fs::write(path, data).map_err(|e| WorkloadError::io("write", path, e))
}

/// Reads the whole file.
pub fn read_file(path: &Path) -> WorkloadResult<Vec<u8>> {
    fs::read(path).map_err(|e| WorkloadError::io("read", path, e))
}

/// Returns whether `path` exists.
pub fn exists(path: &Path) -> WorkloadResult<bool> {
    path.try_exists()
        .map_err(|e| WorkloadError::io("exists", path, e))
}

/// Renames `from` to `to`, refusing to replace an existing `to`.
///
/// `std::fs::rename` overwrites on Unix, so the target is checked first. The
/// names are random per call, so a present target is itself an anomaly.
pub fn rename_no_replace(from: &Path, to: &Path) -> WorkloadResult<()> {
    if exists(to)? {
        return Err(VerifyFailure::new(
            to,
            "rename target already exists",
            Evidence::Exists(false),
            Evidence::Exists(true),
        )
        .into());
    }
    fs::rename(from, to).map_err(|e| WorkloadError::io("rename", from, e))
}

/// Deletes `path` and confirms it is gone.
pub fn remove_and_confirm(path: &Path) -> WorkloadResult<()> {
    fs::remove_file(path).map_err(|e| WorkloadError::io("remove", path, e))?;
    if exists(path)? {
        return Err(VerifyFailure::new(
            path,
            "file exists after cleanup",
            Evidence::Exists(false),
            Evidence::Exists(true),
        )
        .into());
    }
    Ok(())
}

/// Writes `data` at `offset` of an existing file and forces it to stable
/// storage before returning.
///
/// The file is opened for write only, without truncation and without any
/// locking, so other threads may hold the same file open at the same time.
/// The synced handle is returned so a caller can read the range back while
/// its writer is still open.
pub fn write_at_durable(path: &Path, offset: u64, data: &[u8]) -> WorkloadResult<File> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| WorkloadError::io("open for write", path, e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| WorkloadError::io("seek", path, e))?;
    file.write_all(data)
        .map_err(|e| WorkloadError::io("write", path, e))?;
    file.sync_all()
        .map_err(|e| WorkloadError::io("sync", path, e))?;
    Ok(file)
}

/// Reads up to `len` bytes starting at `offset`.
///
/// Returns fewer than `len` bytes only when the file ends first.
pub fn read_at(path: &Path, offset: u64, len: usize) -> WorkloadResult<Vec<u8>> {
    let mut file = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| WorkloadError::io("open for read", path, e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| WorkloadError::io("seek", path, e))?;

    let mut buf = Vec::with_capacity(len);
    file.take(len as u64)
        .read_to_end(&mut buf)
        .map_err(|e| WorkloadError::io("read", path, e))?;
    Ok(buf)
}

/// Counts the entries of a directory.
pub fn count_entries(dir: &Path) -> WorkloadResult<u64> {
    let mut count = 0u64;
    for entry in fs::read_dir(dir).map_err(|e| WorkloadError::io("read_dir", dir, e))? {
        entry.map_err(|e| WorkloadError::io("read_dir_entry", dir, e))?;
        count += 1;
    }
    Ok(count)
}

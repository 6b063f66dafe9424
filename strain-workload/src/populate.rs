//! Bulk population of a directory with identical pseudo-random files.
//!
//! Unlike the stress workloads this runs on one thread and checks nothing:
//! it leaves a known set of files on disk for as long as the caller wants,
//! then deletes them. The content is the same for every file and every run.

use std::path::{Path, PathBuf};

use rand::{RngCore, SeedableRng};
use strain_core::{Limits, Result};
use tracing::{debug, info};

use crate::error::WorkloadResult;
use crate::fsio;
use crate::workload::WorkloadRng;

/// Default size of one populated file in bytes.
pub const POPULATE_FILE_SIZE_DEFAULT: u64 = 512 * 10;

/// Seed of the shared file content.
pub const POPULATE_SEED: u64 = 0;

/// How many files to create, and how large.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulateConfig {
    /// Number of files.
    pub files: u64,
    /// Size of each file in bytes.
    pub file_size: u64,
}

impl PopulateConfig {
    /// Checks the request against `limits`.
    ///
    /// # Errors
    /// Returns an error if either the count or the size is over its limit.
    pub fn validate(&self, limits: &Limits) -> Result<()> {
        Limits::check("populate.files", limits.max_populate_files, self.files)?;
        Limits::check(
            "populate.file_size",
            limits.max_populate_file_bytes,
            self.file_size,
        )
    }
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            files: 0,
            file_size: POPULATE_FILE_SIZE_DEFAULT,
        }
    }
}

/// Returns the content every populated file of `size` bytes holds.
#[must_use]
pub fn populate_content(size: u64) -> Vec<u8> {
    #[allow(clippy::cast_possible_truncation)]
    let mut content = vec![0u8; size as usize];
    WorkloadRng::seed_from_u64(POPULATE_SEED).fill_bytes(&mut content);
    content
}

/// Files created by [`Population::create`].
#[derive(Debug)]
pub struct Population {
    dir: PathBuf,
    files: u64,
    file_size: u64,
}

impl Population {
    /// Writes `config.files` files named `Random<i>.bin` into `dir`,
    /// replacing any file of the same name.
    ///
    /// # Errors
    /// Returns the first I/O error. Files written before it stay on disk.
    pub fn create(dir: &Path, config: &PopulateConfig) -> WorkloadResult<Self> {
        let content = populate_content(config.file_size);
        let population = Self {
            dir: dir.to_path_buf(),
            files: config.files,
            file_size: config.file_size,
        };
        for index in 0..config.files {
            fsio::write_file(&population.path(index), &content)?;
        }
        info!(
            dir = %dir.display(),
            files = config.files,
            file_size = config.file_size,
            "populated directory"
        );
        Ok(population)
    }

    /// Returns the path of file `index`.
    #[must_use]
    pub fn path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("Random{index}.bin"))
    }

    /// Returns the directory holding the files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the number of files created.
    #[must_use]
    pub const fn files(&self) -> u64 {
        self.files
    }

    /// Returns the size of each file.
    #[must_use]
    pub const fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Deletes every created file, confirming each is gone, and returns how
    /// many were deleted.
    ///
    /// # Errors
    /// Returns the first file that cannot be deleted or survives deletion.
    pub fn remove(self) -> WorkloadResult<u64> {
        for index in 0..self.files {
            fsio::remove_and_confirm(&self.path(index))?;
        }
        debug!(dir = %self.dir.display(), files = self.files, "removed populated files");
        Ok(self.files)
    }
}

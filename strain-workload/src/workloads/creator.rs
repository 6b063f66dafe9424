//! Create/read/delete races across independent files.

use std::path::PathBuf;

use bytes::Bytes;
use rand::{Rng, RngCore};
use strain_core::{Iteration, ThreadId};
use tracing::trace;

use crate::error::{Evidence, VerifyFailure, WorkloadResult};
use crate::fsio;
use crate::profiles::CreatorConfig;
use crate::workdir::WorkDir;
use crate::workload::{PreparedWorkload, Workload, WorkloadRng};

/// Writes small randomly-named files with random content.
///
/// Every file is private to the call that created it; the pressure comes from
/// many threads creating, reading and deleting entries in one directory.
#[derive(Debug, Clone)]
pub struct Creator {
    config: CreatorConfig,
}

impl Creator {
    /// Creates the workload.
    #[must_use]
    pub const fn new(config: CreatorConfig) -> Self {
        Self { config }
    }
}

impl Default for Creator {
    fn default() -> Self {
        Self::new(CreatorConfig::default())
    }
}

impl Workload for Creator {
    type Prepared = PreparedCreator;

    fn name(&self) -> &'static str {
        "Creator"
    }

    fn thread_count(&self) -> u32 {
        self.config.threads
    }

    fn prepare(&self, workdir: WorkDir, _rng: &mut WorkloadRng) -> WorkloadResult<PreparedCreator> {
        Ok(PreparedCreator {
            workdir,
            config: self.config.clone(),
        })
    }
}

/// Shared state of a [`Creator`] run.
#[derive(Debug)]
pub struct PreparedCreator {
    workdir: WorkDir,
    config: CreatorConfig,
}

/// A file written by one `act` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedFile {
    /// Where the file was written.
    pub path: PathBuf,
    /// What was written.
    pub payload: Bytes,
}

impl PreparedWorkload for PreparedCreator {
    type Outcome = CreatedFile;

    fn workdir(&self) -> &WorkDir {
        &self.workdir
    }

    fn act(
        &self,
        thread: ThreadId,
        iteration: Iteration,
        rng: &mut WorkloadRng,
    ) -> WorkloadResult<CreatedFile> {
        let path = self.workdir.random_path(rng);
        let len = rng.gen_range(self.config.payload_min..=self.config.payload_max);
        let mut payload = vec![0u8; len as usize];
        rng.fill_bytes(&mut payload);

        fsio::write_file(&path, &payload)?;
        trace!(%thread, %iteration, path = %path.display(), len, "created file");

        Ok(CreatedFile {
            path,
            payload: Bytes::from(payload),
        })
    }

    fn verify(
        &self,
        outcome: CreatedFile,
        _thread: ThreadId,
        _iteration: Iteration,
    ) -> WorkloadResult<()> {
        let read = fsio::read_file(&outcome.path)?;
        if read != outcome.payload {
            return Err(VerifyFailure::new(
                &outcome.path,
                "bytes not equal",
                Evidence::Bytes(outcome.payload),
                Evidence::Bytes(Bytes::from(read)),
            )
            .into());
        }
        fsio::remove_and_confirm(&outcome.path)
    }
}

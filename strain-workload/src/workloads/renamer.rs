//! Rename atomicity under concurrent renamers.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use rand::Rng;
use strain_core::{Iteration, ThreadId};
use tracing::trace;

use crate::error::{Evidence, VerifyFailure, WorkloadResult};
use crate::fsio;
use crate::profiles::RenamerConfig;
use crate::workdir::WorkDir;
use crate::workload::{PreparedWorkload, Workload, WorkloadRng};

/// Creates an empty file, waits a moment, then renames it.
#[derive(Debug, Clone)]
pub struct Renamer {
    config: RenamerConfig,
}

impl Renamer {
    /// Creates the workload.
    #[must_use]
    pub const fn new(config: RenamerConfig) -> Self {
        Self { config }
    }
}

impl Default for Renamer {
    fn default() -> Self {
        Self::new(RenamerConfig::default())
    }
}

impl Workload for Renamer {
    type Prepared = PreparedRenamer;

    fn name(&self) -> &'static str {
        "Renamer"
    }

    fn thread_count(&self) -> u32 {
        self.config.threads
    }

    fn prepare(&self, workdir: WorkDir, _rng: &mut WorkloadRng) -> WorkloadResult<PreparedRenamer> {
        Ok(PreparedRenamer {
            workdir,
            config: self.config.clone(),
        })
    }
}

/// Shared state of a [`Renamer`] run.
#[derive(Debug)]
pub struct PreparedRenamer {
    workdir: WorkDir,
    config: RenamerConfig,
}

/// The two paths of one rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedFile {
    /// Original path; must be gone.
    pub from: PathBuf,
    /// New path; must exist.
    pub to: PathBuf,
}

impl PreparedWorkload for PreparedRenamer {
    type Outcome = RenamedFile;

    fn workdir(&self) -> &WorkDir {
        &self.workdir
    }

    fn act(
        &self,
        thread: ThreadId,
        iteration: Iteration,
        rng: &mut WorkloadRng,
    ) -> WorkloadResult<RenamedFile> {
        let from = self.workdir.random_path(rng);
        let to = self.workdir.random_path(rng);

        fsio::write_file(&from, &[])?;
        // Widen the window between create and rename.
        let delay = rng.gen_range(self.config.delay_min_ms..=self.config.delay_max_ms);
        thread::sleep(Duration::from_millis(delay));
        fsio::rename_no_replace(&from, &to)?;

        trace!(%thread, %iteration, from = %from.display(), to = %to.display(), "renamed file");
        Ok(RenamedFile { from, to })
    }

    fn verify(
        &self,
        outcome: RenamedFile,
        _thread: ThreadId,
        _iteration: Iteration,
    ) -> WorkloadResult<()> {
        if fsio::exists(&outcome.from)? {
            return Err(VerifyFailure::new(
                &outcome.from,
                "renamed file still exists",
                Evidence::Path(outcome.to),
                Evidence::Path(outcome.from.clone()),
            )
            .into());
        }

        if !fsio::exists(&outcome.to)? {
            return Err(VerifyFailure::new(
                &outcome.to,
                "renamed file does not exist",
                Evidence::Exists(true),
                Evidence::Exists(false),
            )
            .into());
        }

        fsio::remove_and_confirm(&outcome.to)
    }
}

//! Concurrent writes into the same files at disjoint offsets.
//!
//! Every thread writes one random section per iteration into *every* shared
//! file, at the offset the [`SectionLayout`] assigns to its
//! `(thread, iteration)`. Threads genuinely race on the same files but never
//! on the same bytes, so any mismatch is a filesystem bug rather than a test
//! artefact. There is no lock of any kind.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use rand::RngCore;
use strain_core::{Iteration, ThreadId};
use tracing::{debug, trace};

use crate::error::{Evidence, VerifyFailure, WorkloadResult};
use crate::fsio;
use crate::position::SectionLayout;
use crate::profiles::SharedRwConfig;
use crate::workdir::WorkDir;
use crate::workload::{PreparedWorkload, Workload, WorkloadRng};

/// When a section is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadBack {
    /// Right after the write, inside `act`.
    Immediate,
    /// During the verification phase.
    Deferred,
}

impl ReadBack {
    const fn short_read(self) -> &'static str {
        match self {
            Self::Immediate => "immediate read-back shorter than section",
            Self::Deferred => "deferred read-back shorter than section",
        }
    }

    const fn mismatch(self) -> &'static str {
        match self {
            Self::Immediate => "immediate read-back not equal to written section",
            Self::Deferred => "deferred read-back not equal to written section",
        }
    }
}

/// Writes random sections into a fixed set of pre-sized shared files.
#[derive(Debug, Clone)]
pub struct SharedReadWrite {
    files: u32,
    layout: SectionLayout,
}

impl SharedReadWrite {
    /// Creates the workload.
    ///
    /// # Errors
    /// Returns an error if the file and section sizes cannot form a layout.
    pub fn new(config: &SharedRwConfig) -> strain_core::Result<Self> {
        let layout = SectionLayout::new(config.section_size, config.threads(), config.file_size)?;
        Ok(Self {
            files: config.files,
            layout,
        })
    }

    /// Returns the section layout.
    #[must_use]
    pub const fn layout(&self) -> &SectionLayout {
        &self.layout
    }
}

impl Workload for SharedReadWrite {
    type Prepared = SharedFiles;

    fn name(&self) -> &'static str {
        "SharedReadWrite"
    }

    fn thread_count(&self) -> u32 {
        self.layout.thread_count()
    }

    fn prepare(&self, workdir: WorkDir, rng: &mut WorkloadRng) -> WorkloadResult<SharedFiles> {
        #[allow(clippy::cast_possible_truncation)]
        let zeros = vec![0u8; self.layout.file_size() as usize];

        let mut paths = Vec::with_capacity(self.files as usize);
        for _ in 0..self.files {
            let path = workdir.random_path(rng);
            fsio::write_file(&path, &zeros)?;
            paths.push(path);
        }
        debug!(
            dir = %workdir.path().display(),
            files = paths.len(),
            file_size = self.layout.file_size(),
            "created shared files"
        );

        Ok(SharedFiles {
            workdir,
            layout: self.layout,
            paths,
        })
    }
}

/// Shared state of a [`SharedReadWrite`] run: the pre-sized files.
#[derive(Debug)]
pub struct SharedFiles {
    workdir: WorkDir,
    layout: SectionLayout,
    paths: Vec<PathBuf>,
}

impl SharedFiles {
    /// Returns the shared file paths.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Reads `section` back from one shared file at `offset`.
    fn check_file(
        path: &Path,
        offset: u64,
        section: &[u8],
        when: ReadBack,
    ) -> WorkloadResult<()> {
        let len = section.len();
        let actual = fsio::read_at(path, offset, len)?;
        if actual.len() != len {
            return Err(VerifyFailure::new(
                path,
                when.short_read(),
                Evidence::Len(len as u64),
                Evidence::Len(actual.len() as u64),
            )
            .into());
        }
        if actual != section {
            return Err(VerifyFailure::new(
                path,
                when.mismatch(),
                Evidence::Bytes(Bytes::copy_from_slice(section)),
                Evidence::Bytes(Bytes::from(actual)),
            )
            .into());
        }
        Ok(())
    }
}

/// What one iteration wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOutcome {
    /// The section written at this iteration's offset in every file.
    Written(Bytes),
    /// The files are exhausted for this thread; nothing was touched.
    Exhausted,
}

impl PreparedWorkload for SharedFiles {
    type Outcome = SectionOutcome;

    fn workdir(&self) -> &WorkDir {
        &self.workdir
    }

    fn act(
        &self,
        thread: ThreadId,
        iteration: Iteration,
        rng: &mut WorkloadRng,
    ) -> WorkloadResult<SectionOutcome> {
        let Some(offset) = self.layout.offset(thread, iteration) else {
            return Ok(SectionOutcome::Exhausted);
        };

        #[allow(clippy::cast_possible_truncation)]
        let mut section = vec![0u8; self.layout.section_size() as usize];
        rng.fill_bytes(&mut section);

        // One file at a time: write, sync, then read back through a second
        // handle while the writer is still open.
        for path in &self.paths {
            let writer = fsio::write_at_durable(path, offset, &section)?;
            Self::check_file(path, offset, &section, ReadBack::Immediate)?;
            drop(writer);
        }

        trace!(%thread, %iteration, offset, "wrote section");
        Ok(SectionOutcome::Written(Bytes::from(section)))
    }

    fn is_noop(outcome: &SectionOutcome) -> bool {
        matches!(outcome, SectionOutcome::Exhausted)
    }

    fn verify(
        &self,
        outcome: SectionOutcome,
        thread: ThreadId,
        iteration: Iteration,
    ) -> WorkloadResult<()> {
        let SectionOutcome::Written(section) = outcome else {
            return Ok(());
        };
        let Some(offset) = self.layout.offset(thread, iteration) else {
            return Err(VerifyFailure::new(
                self.workdir.path(),
                "written section maps past the end of the shared files",
                Evidence::Bytes(section),
                Evidence::Nothing,
            )
            .into());
        };
        for path in &self.paths {
            Self::check_file(path, offset, &section, ReadBack::Deferred)?;
        }
        Ok(())
    }

    fn finish(&self) -> WorkloadResult<()> {
        for path in &self.paths {
            fsio::remove_and_confirm(path)?;
        }
        self.workdir.remove()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn small_config() -> SharedRwConfig {
        SharedRwConfig {
            files: 2,
            threads_per_file: 2,
            file_size: 16 * 4 * 3 + 1,
            section_size: 16,
        }
    }

    fn prepare(root: &TempDir, config: &SharedRwConfig, rng: &mut WorkloadRng) -> SharedFiles {
        let workdir = WorkDir::create(root.path(), 16, rng).unwrap();
        SharedReadWrite::new(config).unwrap().prepare(workdir, rng).unwrap()
    }

    #[test]
    fn test_prepare_creates_zeroed_files() {
        let root = TempDir::new().unwrap();
        let mut rng = WorkloadRng::seed_from_u64(1);
        let workload = SharedReadWrite::new(&SharedRwConfig::default()).unwrap();
        assert_eq!(workload.thread_count(), 15);

        let workdir = WorkDir::create(root.path(), 16, &mut rng).unwrap();
        let files = workload.prepare(workdir, &mut rng).unwrap();
        assert_eq!(files.paths().len(), 5);
        for path in files.paths() {
            let content = std::fs::read(path).unwrap();
            assert_eq!(content.len(), 499_999);
            assert!(content.iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn test_act_writes_every_file_at_offset() {
        let root = TempDir::new().unwrap();
        let mut rng = WorkloadRng::seed_from_u64(2);
        let config = small_config();
        let files = prepare(&root, &config, &mut rng);

        let outcome = files
            .act(ThreadId::new(3), Iteration::new(1), &mut rng)
            .unwrap();
        let SectionOutcome::Written(section) = &outcome else {
            panic!("expected a written section");
        };

        // thread 3, iteration 1: 16 * 3 + 1 * 16 * 4 = 112.
        for path in files.paths() {
            let content = std::fs::read(path).unwrap();
            assert_eq!(&content[112..128], &section[..]);
            assert!(content[..112].iter().all(|b| *b == 0));
            assert!(content[128..].iter().all(|b| *b == 0));
        }

        files
            .verify(outcome, ThreadId::new(3), Iteration::new(1))
            .unwrap();
    }

    #[test]
    fn test_exhaustion_is_idempotent_and_touches_nothing() {
        let root = TempDir::new().unwrap();
        let mut rng = WorkloadRng::seed_from_u64(3);
        let config = small_config();
        let files = prepare(&root, &config, &mut rng);
        let thread = ThreadId::new(0);

        // Three rows fit: iterations 0, 1 and 2.
        for i in 0..3 {
            let outcome = files.act(thread, Iteration::new(i), &mut rng).unwrap();
            assert!(!SharedFiles::is_noop(&outcome));
        }

        // Read-only for non-root users; the byte comparison below is what
        // shows nothing was written.
        for path in files.paths() {
            let mut permissions = std::fs::metadata(path).unwrap().permissions();
            permissions.set_readonly(true);
            std::fs::set_permissions(path, permissions).unwrap();
        }
        let snapshot = |files: &SharedFiles| -> Vec<Vec<u8>> {
            files.paths().iter().map(|p| std::fs::read(p).unwrap()).collect()
        };
        let before = snapshot(&files);

        for i in 3..50 {
            let outcome = files.act(thread, Iteration::new(i), &mut rng).unwrap();
            assert_eq!(outcome, SectionOutcome::Exhausted);
            files.verify(outcome, thread, Iteration::new(i)).unwrap();
        }

        assert_eq!(before, snapshot(&files));
    }

    #[test]
    fn test_verify_detects_overwritten_section() {
        let root = TempDir::new().unwrap();
        let mut rng = WorkloadRng::seed_from_u64(4);
        let config = small_config();
        let files = prepare(&root, &config, &mut rng);

        let outcome = files
            .act(ThreadId::new(0), Iteration::new(0), &mut rng)
            .unwrap();
        drop(fsio::write_at_durable(&files.paths()[1], 0, &[0xAA; 16]).unwrap());

        let err = files
            .verify(outcome, ThreadId::new(0), Iteration::new(0))
            .unwrap_err();
        assert!(err.is_verification());
        assert_eq!(err.location(), files.paths()[1].as_path());
        assert!(err.to_string().contains("deferred read-back not equal"));
    }

    #[test]
    fn test_verify_detects_truncated_file() {
        let root = TempDir::new().unwrap();
        let mut rng = WorkloadRng::seed_from_u64(5);
        let config = small_config();
        let files = prepare(&root, &config, &mut rng);

        let thread = ThreadId::new(1);
        let outcome = files.act(thread, Iteration::new(2), &mut rng).unwrap();
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&files.paths()[0])
            .unwrap();
        file.set_len(10).unwrap();

        let err = files
            .verify(outcome, thread, Iteration::new(2))
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("deferred read-back shorter than section"));
    }

    #[cfg(unix)]
    #[test]
    fn test_immediate_check_runs_before_next_file() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let mut rng = WorkloadRng::seed_from_u64(7);
        let config = small_config();
        let files = prepare(&root, &config, &mut rng);

        // The first file can be written but not read back.
        let first = &files.paths()[0];
        std::fs::set_permissions(first, std::fs::Permissions::from_mode(0o200)).unwrap();
        if std::fs::File::open(first).is_ok() {
            // Permission bits do not bind root.
            return;
        }

        let err = files
            .act(ThreadId::new(0), Iteration::new(0), &mut rng)
            .unwrap_err();
        assert_eq!(err.location(), first.as_path());
        assert!(!err.is_verification());

        // The failed read-back stopped the act before the second file.
        let second = std::fs::read(&files.paths()[1]).unwrap();
        assert!(second.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_concurrent_threads_share_files() {
        let root = TempDir::new().unwrap();
        let mut rng = WorkloadRng::seed_from_u64(6);
        let config = SharedRwConfig {
            files: 2,
            threads_per_file: 3,
            file_size: 16 * 6 * 20 + 1,
            section_size: 16,
        };
        let files = prepare(&root, &config, &mut rng);

        std::thread::scope(|scope| {
            for t in 0..6u32 {
                let files = &files;
                scope.spawn(move || {
                    let mut rng = WorkloadRng::seed_from_u64(u64::from(t));
                    let thread = ThreadId::new(t);
                    let outcomes: Vec<_> = (0..25)
                        .map(|i| files.act(thread, Iteration::new(i), &mut rng).unwrap())
                        .collect();
                    assert_eq!(
                        outcomes.iter().filter(|o| SharedFiles::is_noop(o)).count(),
                        5
                    );
                    for (i, outcome) in (0u64..).zip(outcomes) {
                        files.verify(outcome, thread, Iteration::new(i)).unwrap();
                    }
                });
            }
        });

        files.finish().unwrap();
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}

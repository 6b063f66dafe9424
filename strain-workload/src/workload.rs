//! The workload contract.
//!
//! A workload is split in two stages so that the state threads share is
//! explicit:
//!
//! 1. [`Workload::prepare`] runs once, single-threaded, and turns a fresh
//!    [`WorkDir`] into an immutable prepared value (fixture paths, layout).
//! 2. The prepared value is shared by every thread of the workload, which call
//!    [`PreparedWorkload::act`] in a timed loop and later
//!    [`PreparedWorkload::verify`] on each recorded outcome.
//!
//! Outcomes are typed per workload: the producer decides the shape, the
//! verifier of the same workload consumes it. The runner never inspects them.

use rand_chacha::ChaCha8Rng;
use strain_core::{Iteration, ThreadId};

use crate::error::WorkloadResult;
use crate::workdir::WorkDir;

/// Default number of threads per workload.
pub const THREAD_COUNT_DEFAULT: u32 = 5;

/// Random source handed to every call. One independent stream per thread.
pub type WorkloadRng = ChaCha8Rng;

/// A pluggable stress-test unit.
pub trait Workload: Send + Sync + 'static {
    /// State produced by `prepare` and shared by all threads.
    type Prepared: PreparedWorkload;

    /// Display name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Number of concurrent threads this workload runs with.
    fn thread_count(&self) -> u32 {
        THREAD_COUNT_DEFAULT
    }

    /// Creates fixtures inside `workdir` and returns the shared state.
    ///
    /// Called exactly once per run, before any thread starts, never
    /// concurrently with anything else touching this workload.
    ///
    /// # Errors
    /// Returns an error if fixtures cannot be created.
    fn prepare(&self, workdir: WorkDir, rng: &mut WorkloadRng) -> WorkloadResult<Self::Prepared>;
}

/// The per-run state of a workload, shared read-only across its threads.
pub trait PreparedWorkload: Send + Sync + 'static {
    /// What one `act` call records for its later `verify`.
    type Outcome: Send + 'static;

    /// Returns the working directory this run owns.
    fn workdir(&self) -> &WorkDir;

    /// Performs one unit of filesystem work.
    ///
    /// Called concurrently from every thread of the workload. Each thread
    /// passes its own `thread` id and an `iteration` that starts at 0 and
    /// increases by one per call.
    ///
    /// # Errors
    /// Returns an error on I/O failure or if an immediate self-check fails.
    fn act(
        &self,
        thread: ThreadId,
        iteration: Iteration,
        rng: &mut WorkloadRng,
    ) -> WorkloadResult<Self::Outcome>;

    /// Returns true if `outcome` records that `act` had nothing to do.
    fn is_noop(_outcome: &Self::Outcome) -> bool {
        false
    }

    /// Checks that the filesystem still reflects `outcome`, then cleans up
    /// whatever `act` created for it.
    ///
    /// Called after the action phase, in the order the outcomes were
    /// produced, with a counter that restarts at 0.
    ///
    /// # Errors
    /// Returns an error on any mismatch or I/O failure.
    fn verify(
        &self,
        outcome: Self::Outcome,
        thread: ThreadId,
        iteration: Iteration,
    ) -> WorkloadResult<()>;

    /// Removes fixtures and the working directory once every thread has
    /// verified successfully.
    ///
    /// # Errors
    /// Returns an error if cleanup fails or leaves entries behind.
    fn finish(&self) -> WorkloadResult<()> {
        self.workdir().remove()
    }
}

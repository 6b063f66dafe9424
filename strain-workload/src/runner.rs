//! Concurrent execution of workloads.
//!
//! The runner prepares every workload one after the other, then launches one
//! OS thread per workload thread slot. Each thread runs its own loop:
//!
//! ```text
//! act -> sleep -> act -> ... (until deadline)  then  verify, verify, ...
//! ```
//!
//! Outcomes stay in a vector owned by the thread that produced them. Threads
//! share nothing but a report channel and an abort flag; the flag is raised by
//! the first fatal failure so every other thread stops at its next loop check.
//! The runner returns that failure to its caller instead of exiting.

use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use rand::{Rng, SeedableRng};
use strain_core::{Iteration, ThreadId};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::{WorkloadError, WorkloadResult};
use crate::profiles::StressProfile;
use crate::stats::{RunReport, WorkerStats, WorkloadTally};
use crate::workdir::{WorkDir, NAME_LEN_DEFAULT};
use crate::workload::{PreparedWorkload, Workload, WorkloadRng};

/// Lifecycle of a [`Runner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunPhase {
    /// `run` has not been called.
    NotStarted,
    /// Workloads are being prepared.
    Preparing,
    /// Threads are in their action loop.
    Running,
    /// The deadline passed; threads are verifying.
    Verifying,
    /// The run is over, successfully or not.
    Done,
}

impl RunPhase {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Preparing,
            2 => Self::Running,
            3 => Self::Verifying,
            _ => Self::Done,
        }
    }
}

/// Read-only view of a runner's phase, usable from other threads while
/// [`Runner::run`] is in progress.
#[derive(Debug, Clone)]
pub struct PhaseWatch(Arc<AtomicU8>);

impl PhaseWatch {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RunPhase::NotStarted as u8)))
    }

    /// Returns the phase at the time of the call.
    #[must_use]
    pub fn get(&self) -> RunPhase {
        RunPhase::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, phase: RunPhase) {
        self.0.store(phase as u8, Ordering::SeqCst);
    }
}

/// Which call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `act`, including its immediate self-check.
    Act,
    /// `verify`, after the action phase.
    Verify,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Act => write!(f, "act"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

/// The first error a worker thread hit.
#[derive(Debug, Error)]
#[error("[{workload}] {step} failed on {thread} at {iteration}: {error}")]
pub struct FatalFailure {
    /// Workload name.
    pub workload: &'static str,
    /// Failing thread.
    pub thread: ThreadId,
    /// Iteration counter of the failing call.
    pub iteration: Iteration,
    /// Which call failed.
    pub step: Step,
    /// What went wrong.
    pub error: WorkloadError,
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// A workload could not be prepared.
    #[error("failed to prepare {workload}: {source}")]
    Prepare {
        /// Workload name.
        workload: &'static str,
        /// Underlying error.
        source: WorkloadError,
    },

    /// A worker thread could not be spawned.
    #[error("failed to spawn {workload} thread: {source}")]
    Spawn {
        /// Workload name.
        workload: &'static str,
        /// Underlying error.
        source: std::io::Error,
    },

    /// An `act` or `verify` call failed.
    #[error(transparent)]
    Fatal(Box<FatalFailure>),

    /// A worker thread panicked.
    #[error("[{workload}] {thread} panicked: {message}")]
    Panicked {
        /// Workload name.
        workload: &'static str,
        /// Panicking thread.
        thread: ThreadId,
        /// Panic message.
        message: String,
    },

    /// A workload could not clean up after a successful run.
    #[error("failed to clean up {workload}: {source}")]
    Finish {
        /// Workload name.
        workload: &'static str,
        /// Underlying error.
        source: WorkloadError,
    },

    /// The run would end past what the system clock can represent.
    #[error("duration {duration:?} is too long for the system clock")]
    DurationTooLong {
        /// Requested action phase length.
        duration: Duration,
    },

    /// `run` was called twice on the same runner.
    #[error("runner already started (phase {phase:?})")]
    AlreadyStarted {
        /// Phase the runner was in.
        phase: RunPhase,
    },
}

impl RunError {
    /// Returns the fatal failure, if this is one.
    #[must_use]
    pub fn as_fatal(&self) -> Option<&FatalFailure> {
        match self {
            Self::Fatal(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Settings the runner needs beyond the workloads themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Directory under which every working directory is created.
    pub root: PathBuf,
    /// Length of generated names.
    pub name_len: u32,
    /// Shortest pause between two actions.
    pub pause_min_ms: u64,
    /// Longest pause between two actions.
    pub pause_max_ms: u64,
    /// Seed for every random stream; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Leave working directories on disk after a successful run.
    pub keep_workdirs: bool,
}

impl RunOptions {
    /// Takes run settings from `profile`, rooted at `root`.
    pub fn from_profile(profile: &StressProfile, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            name_len: profile.workdir.name_len,
            pause_min_ms: profile.run.pause_min_ms,
            pause_max_ms: profile.run.pause_max_ms,
            seed: profile.run.seed,
            keep_workdirs: profile.run.keep_workdirs,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            name_len: NAME_LEN_DEFAULT,
            pause_min_ms: 1,
            pause_max_ms: 19,
            seed: None,
            keep_workdirs: false,
        }
    }
}

/// A workload with its outcome type erased, as the runner stores it.
///
/// Implemented for every [`Workload`]; there is nothing to implement by hand.
pub trait AnyWorkload: Send + Sync {
    /// Display name.
    fn name(&self) -> &'static str;

    /// Number of threads.
    fn thread_count(&self) -> u32;

    /// Prepares the workload inside `workdir`.
    ///
    /// # Errors
    /// Returns the workload's preparation error.
    fn arm(&self, workdir: WorkDir, rng: &mut WorkloadRng) -> WorkloadResult<Box<dyn Armed>>;
}

impl<W: Workload> AnyWorkload for W {
    fn name(&self) -> &'static str {
        Workload::name(self)
    }

    fn thread_count(&self) -> u32 {
        Workload::thread_count(self)
    }

    fn arm(&self, workdir: WorkDir, rng: &mut WorkloadRng) -> WorkloadResult<Box<dyn Armed>> {
        let prepared = self.prepare(workdir, rng)?;
        Ok(Box::new(ArmedWorkload {
            prepared: Arc::new(prepared),
        }))
    }
}

/// A prepared workload ready to launch threads.
pub trait Armed: Send + Sync {
    /// Working directory of the run.
    fn workdir(&self) -> &Path;

    /// Launches one worker thread.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to create the thread.
    fn spawn(&self, plan: WorkerPlan) -> std::io::Result<JoinHandle<()>>;

    /// Cleans up after every thread verified successfully.
    ///
    /// # Errors
    /// Returns the workload's cleanup error.
    fn finish(&self) -> WorkloadResult<()>;
}

struct ArmedWorkload<P> {
    prepared: Arc<P>,
}

impl<P: PreparedWorkload> Armed for ArmedWorkload<P> {
    fn workdir(&self) -> &Path {
        self.prepared.workdir().path()
    }

    fn spawn(&self, plan: WorkerPlan) -> std::io::Result<JoinHandle<()>> {
        let prepared = Arc::clone(&self.prepared);
        thread::Builder::new()
            .name(format!("{}-{}", plan.name, plan.thread.get()))
            .spawn(move || run_worker(prepared.as_ref(), plan))
    }

    fn finish(&self) -> WorkloadResult<()> {
        self.prepared.finish()
    }
}

/// Everything one worker thread is bound to.
pub struct WorkerPlan {
    index: usize,
    name: &'static str,
    thread: ThreadId,
    deadline: Instant,
    pause_ms: RangeInclusive<u64>,
    seed: u64,
    abort: Arc<AtomicBool>,
    reports: Sender<WorkerReport>,
}

impl WorkerPlan {
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    fn fail(&self, step: Step, iteration: Iteration, error: WorkloadError) -> WorkerStatus {
        self.abort.store(true, Ordering::SeqCst);
        error!(
            workload = self.name,
            thread = %self.thread,
            %iteration,
            %step,
            location = %error.location().display(),
            error = %error,
            "fatal failure, aborting run"
        );
        WorkerStatus::Failed(Box::new(FatalFailure {
            workload: self.name,
            thread: self.thread,
            iteration,
            step,
            error,
        }))
    }
}

/// How a worker thread ended.
#[derive(Debug)]
enum WorkerStatus {
    Completed,
    Aborted,
    Failed(Box<FatalFailure>),
    Panicked(String),
}

/// Sent by every worker thread when it ends.
#[derive(Debug)]
struct WorkerReport {
    index: usize,
    thread: ThreadId,
    stats: WorkerStats,
    status: WorkerStatus,
}

fn run_worker<P: PreparedWorkload>(prepared: &P, plan: WorkerPlan) {
    let mut stats = WorkerStats::new();
    let driven = panic::catch_unwind(AssertUnwindSafe(|| drive(prepared, &plan, &mut stats)));
    let status = match driven {
        Ok(status) => status,
        Err(payload) => {
            plan.abort.store(true, Ordering::SeqCst);
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(
                workload = plan.name,
                thread = %plan.thread,
                %message,
                "worker panicked, aborting run"
            );
            WorkerStatus::Panicked(message)
        }
    };

    let report = WorkerReport {
        index: plan.index,
        thread: plan.thread,
        stats,
        status,
    };
    if plan.reports.send(report).is_err() {
        debug!(workload = plan.name, thread = %plan.thread, "runner stopped listening");
    }
}

/// The action loop followed by the verification loop.
fn drive<P: PreparedWorkload>(
    prepared: &P,
    plan: &WorkerPlan,
    stats: &mut WorkerStats,
) -> WorkerStatus {
    let mut rng = WorkloadRng::seed_from_u64(plan.seed);
    let mut outcomes = Vec::new();

    let mut iteration = Iteration::new(0);
    while Instant::now() < plan.deadline {
        if plan.aborted() {
            return WorkerStatus::Aborted;
        }
        let started = Instant::now();
        match prepared.act(plan.thread, iteration, &mut rng) {
            Ok(outcome) => {
                stats.record_act(started.elapsed(), P::is_noop(&outcome));
                outcomes.push(outcome);
            }
            Err(error) => return plan.fail(Step::Act, iteration, error),
        }
        iteration = iteration.next();
        thread::sleep(Duration::from_millis(rng.gen_range(plan.pause_ms.clone())));
    }

    // Counts recorded outcomes, not action iterations.
    let mut iteration = Iteration::new(0);
    for outcome in outcomes {
        if plan.aborted() {
            return WorkerStatus::Aborted;
        }
        if let Err(error) = prepared.verify(outcome, plan.thread, iteration) {
            return plan.fail(Step::Verify, iteration, error);
        }
        stats.verified += 1;
        iteration = iteration.next();
    }

    WorkerStatus::Completed
}

struct Worker {
    index: usize,
    thread: ThreadId,
    handle: JoinHandle<()>,
}

/// Runs a set of workloads concurrently for a bounded time.
pub struct Runner {
    options: RunOptions,
    workloads: Vec<Box<dyn AnyWorkload>>,
    phase: PhaseWatch,
}

impl Runner {
    /// Creates a runner for `workloads`.
    #[must_use]
    pub fn new(options: RunOptions, workloads: Vec<Box<dyn AnyWorkload>>) -> Self {
        Self {
            options,
            workloads,
            phase: PhaseWatch::new(),
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase.get()
    }

    /// Returns a handle that follows the phase from another thread.
    #[must_use]
    pub fn phase_watch(&self) -> PhaseWatch {
        self.phase.clone()
    }

    /// Returns the number of threads `run` will launch.
    #[must_use]
    pub fn thread_count(&self) -> u32 {
        self.workloads
            .iter()
            .fold(0u32, |sum, w| sum.saturating_add(w.thread_count()))
    }

    /// Prepares every workload, runs the action phase for `duration`, then
    /// lets every thread verify its own outcomes.
    ///
    /// The runner waits for thread reports until `duration` after the end of
    /// the action phase. Threads still running then are abandoned, not
    /// killed, and their workload is not cleaned up.
    ///
    /// # Errors
    /// Returns the first fatal failure, or a preparation, spawn or cleanup
    /// error. A `duration` the clock cannot represent is rejected before
    /// anything touches the filesystem.
    pub fn run(&mut self, duration: Duration) -> Result<RunReport, RunError> {
        let phase = self.phase();
        if phase != RunPhase::NotStarted {
            return Err(RunError::AlreadyStarted { phase });
        }
        let result = self.execute(duration);
        self.phase.set(RunPhase::Done);
        info!(phase = ?RunPhase::Done, ok = result.is_ok(), "run finished");
        result
    }

    fn execute(&self, duration: Duration) -> Result<RunReport, RunError> {
        let started = Instant::now();
        // The wait ceiling is a second duration past the deadline.
        if window_end(started, duration).is_none() {
            return Err(RunError::DurationTooLong { duration });
        }
        let mut rng = self
            .options
            .seed
            .map_or_else(WorkloadRng::from_entropy, WorkloadRng::seed_from_u64);

        self.phase.set(RunPhase::Preparing);
        let mut armed: Vec<Box<dyn Armed>> = Vec::with_capacity(self.workloads.len());
        for workload in &self.workloads {
            let name = workload.name();
            let workdir = WorkDir::create(&self.options.root, self.options.name_len, &mut rng)
                .map_err(|source| RunError::Prepare { workload: name, source })?;
            info!(workload = name, dir = %workdir.path().display(), "preparing workload");
            armed.push(
                workload
                    .arm(workdir, &mut rng)
                    .map_err(|source| RunError::Prepare { workload: name, source })?,
            );
        }

        let abort = Arc::new(AtomicBool::new(false));
        let (reports_tx, reports_rx) = unbounded();
        let now = Instant::now();
        let (deadline, ceiling) =
            window_end(now, duration).ok_or(RunError::DurationTooLong { duration })?;
        let mut workers = Vec::new();

        for (index, (workload, stage)) in self.workloads.iter().zip(&armed).enumerate() {
            for t in 0..workload.thread_count() {
                let plan = WorkerPlan {
                    index,
                    name: workload.name(),
                    thread: ThreadId::new(t),
                    deadline,
                    pause_ms: self.options.pause_min_ms..=self.options.pause_max_ms,
                    seed: rng.gen(),
                    abort: Arc::clone(&abort),
                    reports: reports_tx.clone(),
                };
                match stage.spawn(plan) {
                    Ok(handle) => workers.push(Worker {
                        index,
                        thread: ThreadId::new(t),
                        handle,
                    }),
                    Err(source) => {
                        abort.store(true, Ordering::SeqCst);
                        return Err(RunError::Spawn {
                            workload: workload.name(),
                            source,
                        });
                    }
                }
            }
        }
        drop(reports_tx);

        self.phase.set(RunPhase::Running);
        info!(threads = workers.len(), ?duration, "action phase started");

        let mut tallies: Vec<WorkloadTally> = self
            .workloads
            .iter()
            .zip(&armed)
            .map(|(w, a)| {
                WorkloadTally::new(w.name(), a.workdir().to_path_buf(), w.thread_count())
            })
            .collect();
        let mut reported = HashSet::with_capacity(workers.len());
        let mut failure: Option<RunError> = None;

        while reported.len() < workers.len() {
            let wait_until = if self.phase() == RunPhase::Running {
                deadline
            } else {
                ceiling
            };
            match reports_rx.recv_deadline(wait_until) {
                Ok(report) => {
                    reported.insert((report.index, report.thread));
                    tallies[report.index].absorb(&report.stats);
                    let name = self.workloads[report.index].name();
                    match report.status {
                        WorkerStatus::Completed | WorkerStatus::Aborted => {}
                        WorkerStatus::Failed(fatal) => {
                            failure.get_or_insert(RunError::Fatal(fatal));
                        }
                        WorkerStatus::Panicked(message) => {
                            failure.get_or_insert(RunError::Panicked {
                                workload: name,
                                thread: report.thread,
                                message,
                            });
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) if self.phase() == RunPhase::Running => {
                    self.phase.set(RunPhase::Verifying);
                    info!("action phase over, verifying");
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }

        let launched = workers.len();
        for worker in workers {
            if reported.contains(&(worker.index, worker.thread)) {
                // Panics were caught inside the thread.
                let _ = worker.handle.join();
            } else {
                tallies[worker.index].abandoned += 1;
                warn!(
                    thread = %worker.thread,
                    workdir = %armed[worker.index].workdir().display(),
                    "thread still running at join ceiling, abandoning it"
                );
            }
        }

        if let Some(failure) = failure {
            return Err(failure);
        }

        if !self.options.keep_workdirs {
            for ((workload, stage), tally) in self.workloads.iter().zip(&armed).zip(&tallies) {
                if tally.abandoned > 0 {
                    warn!(workload = workload.name(), "skipping cleanup, threads abandoned");
                    continue;
                }
                stage.finish().map_err(|source| RunError::Finish {
                    workload: workload.name(),
                    source,
                })?;
            }
        }

        Ok(RunReport {
            threads_launched: launched,
            workloads: tallies.iter().map(WorkloadTally::summary).collect(),
            elapsed: started.elapsed(),
        })
    }
}

/// Returns the action deadline and the wait ceiling for a run starting at
/// `start`, or `None` if either overflows the clock.
fn window_end(start: Instant, duration: Duration) -> Option<(Instant, Instant)> {
    let deadline = start.checked_add(duration)?;
    let ceiling = deadline.checked_add(duration)?;
    Some((deadline, ceiling))
}

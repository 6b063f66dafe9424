//! Strain Workload: Filesystem Concurrency Stress Testing
//!
//! Runs several self-verifying workloads against a filesystem at once and
//! stops at the first inconsistency it sees. Three workloads ship with it:
//!
//! 1. **Creator** - write a random payload to a new file, read it back later
//! 2. **Renamer** - create an empty file, rename it, check both names later
//! 3. **SharedReadWrite** - many threads writing disjoint sections of the same files
//!
//! The [`populate`] module fills a directory with identical files outside of
//! any stress run.
//!
//! # Architecture
//!
//! Every thread of every workload runs the same two loops:
//! - **Action loop**: call `act` until the deadline, keeping each outcome
//! - **Verify loop**: hand each outcome back to `verify`, in order
//!
//! Any failure raises a shared abort flag; the [`Runner`] returns the first
//! one as a [`RunError::Fatal`] and leaves the working directories in place.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use strain_workload::{profiles::StressProfile, workloads, RunOptions, Runner};
//!
//! let profile = StressProfile::default();
//! let options = RunOptions::from_profile(&profile, "/mnt/under-test");
//! let mut runner = Runner::new(options, workloads::builtin(&profile)?);
//!
//! let report = runner.run(Duration::from_secs(10))?;
//! report.print_summary();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod fsio;
mod position;
mod runner;
mod stats;
mod workdir;
mod workload;

pub mod populate;
pub mod profiles;
pub mod workloads;

pub use error::{Evidence, VerifyFailure, WorkloadError, WorkloadResult};
pub use position::SectionLayout;
pub use runner::{
    AnyWorkload, Armed, FatalFailure, PhaseWatch, RunError, RunOptions, RunPhase, Runner, Step,
    WorkerPlan,
};
pub use stats::{RunReport, WorkerStats, WorkloadSummary};
pub use workdir::{random_name, WorkDir, NAME_LEN_DEFAULT};
pub use workload::{PreparedWorkload, Workload, WorkloadRng, THREAD_COUNT_DEFAULT};

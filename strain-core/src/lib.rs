//! Strain Core - Strongly-typed identifiers and limits for the Strain harness.
//!
//! This crate holds the vocabulary shared by the workload engine and the
//! binary. It does NOT touch the filesystem; everything here is plain data.
//!
//! # Design Principles (TigerStyle)
//!
//! - **Strongly-typed IDs**: Prevent mixing up a `ThreadId` with an `Iteration`
//! - **Explicit limits**: Every thread count and file size has a bounded maximum
//! - **Explicit types**: Use u32/u64, not usize
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod limits;
mod types;

pub use error::{Error, Result};
pub use limits::Limits;
pub use types::{Iteration, ThreadId, WorkloadIndex};

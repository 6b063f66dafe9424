//! Built-in workloads.
//!
//! The registry order is part of the command-line interface: workloads are
//! selected by their zero-based index in [`builtin`].

mod creator;
mod renamer;
mod shared_rw;

pub use creator::{CreatedFile, Creator, PreparedCreator};
pub use renamer::{PreparedRenamer, RenamedFile, Renamer};
pub use shared_rw::{SectionOutcome, SharedFiles, SharedReadWrite};

use crate::profiles::StressProfile;
use crate::runner::AnyWorkload;

/// Builds every built-in workload from `profile`, in registry order.
///
/// # Errors
/// Returns an error if the shared read/write settings cannot form a layout.
pub fn builtin(profile: &StressProfile) -> strain_core::Result<Vec<Box<dyn AnyWorkload>>> {
    Ok(vec![
        Box::new(Creator::new(profile.creator.clone())),
        Box::new(Renamer::new(profile.renamer.clone())),
        Box::new(SharedReadWrite::new(&profile.shared_rw)?),
    ])
}

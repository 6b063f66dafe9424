//! Workload selection from the command line.
//!
//! A selection is either the literal `all` or a comma-separated list of
//! zero-based indices into the built-in workload registry. Tokens that are not
//! indices, and indices past the end of the registry, are logged and skipped.

use std::collections::BTreeSet;

use strain_core::WorkloadIndex;
use tracing::warn;

/// The workloads a run should include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every registered workload.
    All,
    /// Only these indices.
    Indices(BTreeSet<WorkloadIndex>),
}

impl Selection {
    /// Parses a selection argument, skipping malformed tokens.
    pub fn parse(arg: &str) -> Self {
        if arg.trim() == "all" {
            return Self::All;
        }

        let mut indices = BTreeSet::new();
        for token in arg.split(',') {
            match token.trim().parse::<u32>() {
                Ok(index) => {
                    indices.insert(WorkloadIndex::new(index));
                }
                Err(e) => warn!(token, error = %e, "skipping invalid workload index"),
            }
        }
        Self::Indices(indices)
    }

    /// Returns true if the workload at `index` is selected.
    pub fn contains(&self, index: WorkloadIndex) -> bool {
        match self {
            Self::All => true,
            Self::Indices(indices) => indices.contains(&index),
        }
    }

    /// Logs every selected index at or past `available`, returning how many
    /// there were.
    pub fn warn_out_of_range(&self, available: u32) -> usize {
        let Self::Indices(indices) = self else {
            return 0;
        };
        let missing: Vec<_> = indices
            .iter()
            .filter(|index| index.get() >= available)
            .collect();
        for index in &missing {
            warn!(%index, available, "skipping out-of-range workload index");
        }
        missing.len()
    }
}

//! Run statistics.

use std::path::PathBuf;
use std::time::Duration;

use hdrhistogram::Histogram;
use tracing::warn;

/// Counters kept privately by one worker thread.
#[derive(Debug, Clone)]
pub struct WorkerStats {
    /// Successful `act` calls, no-ops included.
    pub acts: u64,
    /// `act` calls that had nothing to do.
    pub noops: u64,
    /// Successful `verify` calls.
    pub verified: u64,
    /// `act` latency in microseconds.
    pub act_latency: Histogram<u64>,
}

impl WorkerStats {
    /// Creates empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            acts: 0,
            noops: 0,
            verified: 0,
            act_latency: Histogram::<u64>::new(3).expect("histogram creation"),
        }
    }

    /// Records one successful `act`.
    pub fn record_act(&mut self, elapsed: Duration, noop: bool) {
        self.acts += 1;
        if noop {
            self.noops += 1;
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.act_latency.saturating_record(micros);
    }
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate of every worker of one workload.
#[derive(Debug, Clone)]
pub(crate) struct WorkloadTally {
    name: &'static str,
    workdir: PathBuf,
    threads: u32,
    pub(crate) abandoned: u32,
    totals: WorkerStats,
}

impl WorkloadTally {
    pub(crate) fn new(name: &'static str, workdir: PathBuf, threads: u32) -> Self {
        Self {
            name,
            workdir,
            threads,
            abandoned: 0,
            totals: WorkerStats::new(),
        }
    }

    pub(crate) fn absorb(&mut self, stats: &WorkerStats) {
        self.totals.acts += stats.acts;
        self.totals.noops += stats.noops;
        self.totals.verified += stats.verified;
        if let Err(e) = self.totals.act_latency.add(&stats.act_latency) {
            warn!(workload = self.name, error = %e, "dropping latency samples");
        }
    }

    pub(crate) fn summary(&self) -> WorkloadSummary {
        let latency = &self.totals.act_latency;
        WorkloadSummary {
            name: self.name,
            workdir: self.workdir.clone(),
            threads: self.threads,
            acts: self.totals.acts,
            noops: self.totals.noops,
            verified: self.totals.verified,
            abandoned: self.abandoned,
            act_latency_p50_us: latency.value_at_quantile(0.50),
            act_latency_p99_us: latency.value_at_quantile(0.99),
            act_latency_max_us: latency.max(),
        }
    }
}

/// Per-workload results of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSummary {
    /// Workload name.
    pub name: &'static str,
    /// Working directory used by this run.
    pub workdir: PathBuf,
    /// Threads launched.
    pub threads: u32,
    /// Successful `act` calls, no-ops included.
    pub acts: u64,
    /// `act` calls that had nothing to do.
    pub noops: u64,
    /// Outcomes verified.
    pub verified: u64,
    /// Threads that had not reported when the runner stopped waiting.
    pub abandoned: u32,
    /// `act` latency p50 in microseconds.
    pub act_latency_p50_us: u64,
    /// `act` latency p99 in microseconds.
    pub act_latency_p99_us: u64,
    /// `act` latency max in microseconds.
    pub act_latency_max_us: u64,
}

/// Results of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Threads launched across all workloads.
    pub threads_launched: usize,
    /// One entry per workload, in run order.
    pub workloads: Vec<WorkloadSummary>,
    /// Wall time from preparation to the last report.
    pub elapsed: Duration,
}

impl RunReport {
    /// Returns the number of threads that were abandoned.
    #[must_use]
    pub fn abandoned_threads(&self) -> u32 {
        self.workloads.iter().map(|w| w.abandoned).sum()
    }

    /// Prints a summary to stdout.
    pub fn print_summary(&self) {
        println!("=== Run Summary ===");
        println!("Threads: {}", self.threads_launched);
        for w in &self.workloads {
            println!(
                "[{}] acts: {} ({} no-op), verified: {}, threads: {}, abandoned: {}",
                w.name, w.acts, w.noops, w.verified, w.threads, w.abandoned
            );
            println!(
                "[{}] act latency: p50={}us p99={}us max={}us",
                w.name, w.act_latency_p50_us, w.act_latency_p99_us, w.act_latency_max_us
            );
        }
        println!("Elapsed: {:?}", self.elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_act() {
        let mut stats = WorkerStats::new();
        stats.record_act(Duration::from_micros(100), false);
        stats.record_act(Duration::from_micros(300), true);

        assert_eq!(stats.acts, 2);
        assert_eq!(stats.noops, 1);
        assert_eq!(stats.act_latency.len(), 2);
    }

    #[test]
    fn test_tally_merges_workers() {
        let mut tally = WorkloadTally::new("Creator", PathBuf::from("abc"), 2);

        let mut a = WorkerStats::new();
        a.record_act(Duration::from_micros(10), false);
        a.verified = 1;
        let mut b = WorkerStats::new();
        b.record_act(Duration::from_micros(1000), false);
        b.record_act(Duration::from_micros(20), true);
        b.verified = 2;

        tally.absorb(&a);
        tally.absorb(&b);
        tally.abandoned = 1;

        let summary = tally.summary();
        assert_eq!(summary.acts, 3);
        assert_eq!(summary.noops, 1);
        assert_eq!(summary.verified, 3);
        assert_eq!(summary.abandoned, 1);
        assert!(summary.act_latency_max_us >= 1000);
        assert!(summary.act_latency_p50_us < 1000);
    }
}

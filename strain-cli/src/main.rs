//! Strain filesystem stress harness binary.
//!
//! Runs the selected built-in workloads against the filesystem holding the
//! root directory, then verifies everything they did.
//!
//! ```bash
//! # Every workload for 30 seconds in the current directory
//! strain 30 all
//!
//! # Creator and SharedReadWrite only, on another mount, no prompt
//! strain 60 0,2 --root /mnt/under-test --yes
//!
//! # Built-in soak profile with a fixed seed
//! strain --builtin soak --seed 42
//!
//! # Leave 1000 files of 5120 bytes in /mnt/under-test until Enter
//! strain populate 1000 --dir /mnt/under-test
//! ```
//!
//! The process exits non-zero on the first fatal failure and leaves the
//! working directories in place for inspection.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod selection;

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use strain_core::{Limits, WorkloadIndex};
use strain_workload::populate::{PopulateConfig, Population, POPULATE_FILE_SIZE_DEFAULT};
use strain_workload::profiles::{list_profiles, load_profile, StressProfile};
use strain_workload::{workloads, AnyWorkload, RunOptions, Runner};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::selection::Selection;

/// Filesystem concurrency stress harness.
#[derive(Parser, Debug)]
#[command(name = "strain")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Length of the action phase in seconds. Defaults to the profile's.
    duration_secs: Option<u64>,

    /// `all`, or a comma-separated list of zero-based workload indices.
    #[arg(default_value = "all")]
    selection: String,

    /// TOML profile to load instead of a built-in one.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Built-in profile name.
    #[arg(long, default_value = "default", conflicts_with = "profile")]
    builtin: String,

    /// Seed for every random stream. Random if unset.
    #[arg(long)]
    seed: Option<u64>,

    /// Directory the working directories are created in.
    /// Defaults to the current directory.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Start without waiting for Enter.
    #[arg(long, short = 'y')]
    yes: bool,

    /// Leave working directories on disk after a successful run.
    #[arg(long)]
    keep_workdirs: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: Level,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create identical pseudo-random files, wait, then delete them.
    Populate {
        /// Number of files to create.
        files: u64,

        /// Size of each file in bytes.
        #[arg(long, default_value_t = POPULATE_FILE_SIZE_DEFAULT)]
        size: u64,

        /// Directory the files are created in. Defaults to the current directory.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Delete the files without waiting for Enter.
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the console report.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {e}");
        return ExitCode::FAILURE;
    }

    let result = match &args.command {
        Some(Command::Populate {
            files,
            size,
            dir,
            yes,
        }) => populate(*files, *size, dir.as_ref(), *yes),
        None => run(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "stress run failed");
            eprintln!("FAILED: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let profile = resolve_profile(args)?;
    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let duration = resolve_duration(args.duration_secs, &profile, &Limits::default())?;

    let selection = Selection::parse(&args.selection);
    let available = workloads::builtin(&profile)?;
    let count = u32::try_from(available.len())?;
    selection.warn_out_of_range(count);

    let selected = select(available, &selection);
    info!(
        profile = %profile.name,
        root = %root.display(),
        ?duration,
        selected = selected.len(),
        "configured run"
    );

    println!();
    println!("Starting stress test in {}.", root.display());
    if !args.yes {
        wait_for_enter("Press enter to continue")?;
    }
    println!();

    let started = Instant::now();
    let mut runner = Runner::new(RunOptions::from_profile(&profile, root), selected);
    println!("Launching {} threads", runner.thread_count());

    let report = runner.run(duration)?;
    report.print_summary();
    if report.abandoned_threads() > 0 {
        println!(
            "WARNING: {} threads did not finish and were abandoned",
            report.abandoned_threads()
        );
    }

    println!("Successfully done after {:?}", started.elapsed());
    Ok(())
}

/// Loads the requested profile and applies command-line overrides.
fn resolve_profile(args: &Args) -> Result<StressProfile, Box<dyn std::error::Error>> {
    let mut profile = match &args.profile {
        Some(path) => StressProfile::from_file(path)?,
        None => load_profile(&args.builtin).map_err(|e| {
            format!("{e} (available: {})", list_profiles().join(", "))
        })?,
    };

    if args.seed.is_some() {
        profile.run.seed = args.seed;
    }
    if args.keep_workdirs {
        profile.run.keep_workdirs = true;
    }

    profile.validate(&Limits::default())?;
    Ok(profile)
}

/// Returns the action phase length: the command line's if given, else the
/// profile's, bounded by `limits`.
fn resolve_duration(
    arg: Option<u64>,
    profile: &StressProfile,
    limits: &Limits,
) -> strain_core::Result<Duration> {
    let secs = arg.unwrap_or(profile.run.duration_secs);
    Limits::check("duration_secs", limits.max_duration_secs, secs)?;
    Ok(Duration::from_secs(secs))
}

/// Fills a directory with identical files, then deletes them once the user
/// presses Enter.
fn populate(
    files: u64,
    file_size: u64,
    dir: Option<&PathBuf>,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = PopulateConfig { files, file_size };
    config.validate(&Limits::default())?;
    let dir = match dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    let population = Population::create(&dir, &config)?;
    println!(
        "Created {} files of {} bytes in {}",
        population.files(),
        population.file_size(),
        population.dir().display()
    );

    if !yes {
        wait_for_enter("Press enter to delete the generated files")?;
    }
    let removed = population.remove()?;
    println!("Deleted {removed} files");
    Ok(())
}

fn wait_for_enter(prompt: &str) -> std::io::Result<()> {
    println!("{prompt}");
    std::io::stdin().lock().read_line(&mut String::new())?;
    Ok(())
}

/// Prints the registry with selection markers and keeps the selected entries.
fn select(
    available: Vec<Box<dyn AnyWorkload>>,
    selection: &Selection,
) -> Vec<Box<dyn AnyWorkload>> {
    println!("Available stress tests:");
    let mut selected = Vec::new();
    for (index, workload) in (0u32..).map(WorkloadIndex::new).zip(available) {
        let chosen = selection.contains(index);
        let marker = if chosen { " [Selected]" } else { "" };
        println!("{}: {}{marker}", index.get(), workload.name());
        if chosen {
            selected.push(workload);
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_falls_back_to_profile() {
        let profile = StressProfile::default();
        let limits = Limits::default();

        let duration = resolve_duration(None, &profile, &limits).unwrap();
        assert_eq!(duration, Duration::from_secs(profile.run.duration_secs));

        let duration = resolve_duration(Some(3), &profile, &limits).unwrap();
        assert_eq!(duration, Duration::from_secs(3));
    }

    #[test]
    fn test_duration_over_limit_rejected() {
        let profile = StressProfile::default();
        let limits = Limits::default();

        assert!(resolve_duration(Some(limits.max_duration_secs), &profile, &limits).is_ok());
        assert!(resolve_duration(Some(limits.max_duration_secs + 1), &profile, &limits).is_err());
        assert!(resolve_duration(Some(u64::MAX), &profile, &limits).is_err());
    }

    #[test]
    fn test_populate_subcommand_parses() {
        let argv = ["strain", "populate", "12", "--size", "64", "-y"];
        let args = Args::try_parse_from(argv).unwrap();
        match args.command {
            Some(Command::Populate {
                files, size, yes, ..
            }) => {
                assert_eq!(files, 12);
                assert_eq!(size, 64);
                assert!(yes);
            }
            None => panic!("expected populate"),
        }
    }

    #[test]
    fn test_stress_positionals_parse() {
        let args = Args::try_parse_from(["strain", "30", "0,2", "--yes"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.duration_secs, Some(30));
        assert_eq!(args.selection, "0,2");
        assert!(args.yes);
    }

    #[test]
    fn test_populate_removes_files_with_yes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        populate(5, 16, Some(&path), true).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

//! Run profiles.
//!
//! A profile bundles every tuning knob of a run. Profiles load from TOML; any
//! section or field left out keeps its default, so a file only needs to name
//! what it changes.
//!
//! # Example
//!
//! ```ignore
//! use strain_workload::profiles::{load_profile, StressProfile};
//!
//! // Load a named profile
//! let profile = load_profile("quick").unwrap();
//!
//! // Or load from a TOML file
//! let profile = StressProfile::from_file("custom.toml").unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use strain_core::Limits;

use crate::workdir::NAME_LEN_DEFAULT;
use crate::workload::THREAD_COUNT_DEFAULT;

/// Run-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// Length of the action phase in seconds.
    pub duration_secs: u64,
    /// Seed for every random stream; `None` draws one from the OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Shortest pause between two actions of one thread.
    pub pause_min_ms: u64,
    /// Longest pause between two actions of one thread.
    pub pause_max_ms: u64,
    /// Leave working directories on disk after a successful run.
    pub keep_workdirs: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            seed: None,
            pause_min_ms: 1,
            pause_max_ms: 19,
            keep_workdirs: false,
        }
    }
}

/// Naming of working directories and files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkdirSection {
    /// Length of every generated name.
    pub name_len: u32,
}

impl Default for WorkdirSection {
    fn default() -> Self {
        Self {
            name_len: NAME_LEN_DEFAULT,
        }
    }
}

/// Settings of the file creator workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatorConfig {
    /// Number of threads.
    pub threads: u32,
    /// Smallest payload in bytes.
    pub payload_min: u32,
    /// Largest payload in bytes.
    pub payload_max: u32,
}

impl Default for CreatorConfig {
    fn default() -> Self {
        Self {
            threads: THREAD_COUNT_DEFAULT,
            payload_min: 1,
            payload_max: 19,
        }
    }
}

/// Settings of the file renamer workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenamerConfig {
    /// Number of threads.
    pub threads: u32,
    /// Shortest delay between create and rename.
    pub delay_min_ms: u64,
    /// Longest delay between create and rename.
    pub delay_max_ms: u64,
}

impl Default for RenamerConfig {
    fn default() -> Self {
        Self {
            threads: THREAD_COUNT_DEFAULT,
            delay_min_ms: 1,
            delay_max_ms: 4,
        }
    }
}

/// Settings of the shared read/write workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedRwConfig {
    /// Number of shared files.
    pub files: u32,
    /// Threads per shared file; the workload runs `files * threads_per_file`.
    pub threads_per_file: u32,
    /// Size of each shared file in bytes.
    pub file_size: u64,
    /// Size of each written section in bytes.
    pub section_size: u32,
}

impl Default for SharedRwConfig {
    fn default() -> Self {
        Self {
            files: 5,
            threads_per_file: 3,
            file_size: 500_000 - 1, // ~500KB
            section_size: 16,
        }
    }
}

impl SharedRwConfig {
    /// Returns the total thread count, saturating on overflow.
    #[must_use]
    pub const fn threads(&self) -> u32 {
        self.files.saturating_mul(self.threads_per_file)
    }
}

/// A complete stress profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressProfile {
    /// Profile name.
    pub name: String,
    /// Description of what this profile is for.
    pub description: String,
    /// Run-wide settings.
    pub run: RunSection,
    /// Naming settings.
    pub workdir: WorkdirSection,
    /// Creator workload settings.
    pub creator: CreatorConfig,
    /// Renamer workload settings.
    pub renamer: RenamerConfig,
    /// Shared read/write workload settings.
    pub shared_rw: SharedRwConfig,
}

impl Default for StressProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: "Default stress profile".to_string(),
            run: RunSection::default(),
            workdir: WorkdirSection::default(),
            creator: CreatorConfig::default(),
            renamer: RenamerConfig::default(),
            shared_rw: SharedRwConfig::default(),
        }
    }
}

impl StressProfile {
    /// Load a profile from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ProfileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse a profile from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML cannot be parsed.
    pub fn from_toml(toml: &str) -> Result<Self, ProfileError> {
        toml::from_str(toml).map_err(|e| ProfileError::Parse {
            message: e.to_string(),
        })
    }

    /// Serialize the profile to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Checks every knob against `limits` and for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self, limits: &Limits) -> Result<(), ProfileError> {
        limits.validate()?;

        Limits::check("run.duration_secs", limits.max_duration_secs, self.run.duration_secs)?;
        if self.run.pause_min_ms > self.run.pause_max_ms {
            return Err(invalid("run.pause_max_ms", "must be >= pause_min_ms"));
        }
        Limits::check("run.pause_max_ms", limits.max_pause_ms, self.run.pause_max_ms)?;

        if self.workdir.name_len < limits.min_name_len {
            return Err(invalid("workdir.name_len", "too short to avoid collisions"));
        }
        Limits::check(
            "workdir.name_len",
            u64::from(limits.max_name_len),
            u64::from(self.workdir.name_len),
        )?;

        check_threads("creator.threads", self.creator.threads, limits)?;
        if self.creator.payload_min == 0 {
            return Err(invalid("creator.payload_min", "must be positive"));
        }
        if self.creator.payload_min > self.creator.payload_max {
            return Err(invalid("creator.payload_max", "must be >= payload_min"));
        }
        Limits::check(
            "creator.payload_max",
            u64::from(limits.max_payload_bytes),
            u64::from(self.creator.payload_max),
        )?;

        check_threads("renamer.threads", self.renamer.threads, limits)?;
        if self.renamer.delay_min_ms > self.renamer.delay_max_ms {
            return Err(invalid("renamer.delay_max_ms", "must be >= delay_min_ms"));
        }
        Limits::check("renamer.delay_max_ms", limits.max_pause_ms, self.renamer.delay_max_ms)?;

        if self.shared_rw.files == 0 {
            return Err(invalid("shared_rw.files", "must be positive"));
        }
        Limits::check(
            "shared_rw.files",
            u64::from(limits.max_shared_files),
            u64::from(self.shared_rw.files),
        )?;
        check_threads("shared_rw.threads", self.shared_rw.threads(), limits)?;
        if self.shared_rw.section_size == 0 {
            return Err(invalid("shared_rw.section_size", "must be positive"));
        }
        Limits::check(
            "shared_rw.section_size",
            u64::from(limits.max_section_bytes),
            u64::from(self.shared_rw.section_size),
        )?;
        if self.shared_rw.file_size <= u64::from(self.shared_rw.section_size) {
            return Err(invalid("shared_rw.file_size", "must be > section_size"));
        }
        Limits::check(
            "shared_rw.file_size",
            limits.max_shared_file_bytes,
            self.shared_rw.file_size,
        )?;

        Ok(())
    }
}

const fn invalid(name: &'static str, reason: &'static str) -> ProfileError {
    ProfileError::Invalid(strain_core::Error::InvalidArgument { name, reason })
}

fn check_threads(name: &'static str, threads: u32, limits: &Limits) -> Result<(), ProfileError> {
    if threads == 0 {
        return Err(invalid(name, "must be positive"));
    }
    Limits::check(
        name,
        u64::from(limits.max_threads_per_workload),
        u64::from(threads),
    )?;
    Ok(())
}

/// Error type for profile operations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// I/O error reading profile file.
    #[error("failed to read profile from {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Parse error in TOML.
    #[error("failed to parse profile: {message}")]
    Parse {
        /// Error message.
        message: String,
    },
    /// Profile not found.
    #[error("profile not found: {name}")]
    NotFound {
        /// Profile name.
        name: String,
    },
    /// A setting is out of range.
    #[error("invalid profile: {0}")]
    Invalid(#[from] strain_core::Error),
}

#[allow(clippy::too_many_arguments)]
fn profile(
    name: &str,
    desc: &str,
    duration_secs: u64,
    creator_threads: u32,
    renamer_threads: u32,
    files: u32,
    threads_per_file: u32,
    file_size: u64,
) -> StressProfile {
    StressProfile {
        name: name.to_string(),
        description: desc.to_string(),
        run: RunSection {
            duration_secs,
            ..RunSection::default()
        },
        workdir: WorkdirSection::default(),
        creator: CreatorConfig {
            threads: creator_threads,
            ..CreatorConfig::default()
        },
        renamer: RenamerConfig {
            threads: renamer_threads,
            ..RenamerConfig::default()
        },
        shared_rw: SharedRwConfig {
            files,
            threads_per_file,
            file_size,
            ..SharedRwConfig::default()
        },
    }
}

/// Built-in profiles for common scenarios.
#[must_use]
pub fn builtin_profiles() -> HashMap<&'static str, StressProfile> {
    HashMap::from([
        (
            "quick",
            profile("quick", "Short smoke run with few threads", 2, 2, 2, 2, 2, 64 * 1024),
        ),
        ("default", StressProfile::default()),
        (
            "soak",
            profile(
                "soak",
                "Long run with heavy contention",
                300,
                16,
                16,
                8,
                4,
                4 * 1024 * 1024,
            ),
        ),
    ])
}

/// Load a built-in profile by name.
///
/// # Errors
///
/// Returns an error if the profile name is not found.
pub fn load_profile(name: &str) -> Result<StressProfile, ProfileError> {
    builtin_profiles()
        .remove(name)
        .ok_or_else(|| ProfileError::NotFound {
            name: name.to_string(),
        })
}

/// List all available built-in profile names.
#[must_use]
pub fn list_profiles() -> Vec<&'static str> {
    let mut names: Vec<_> = builtin_profiles().keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = StressProfile::default();
        assert_eq!(profile.creator.threads, 5);
        assert_eq!(profile.shared_rw.threads(), 15);
        assert_eq!(profile.shared_rw.file_size, 499_999);
        assert_eq!(profile.workdir.name_len, 16);
        assert!(profile.validate(&Limits::new()).is_ok());
    }

    #[test]
    fn test_builtin_profiles_are_valid() {
        let limits = Limits::new();
        for (name, profile) in builtin_profiles() {
            assert_eq!(profile.name, name);
            assert!(profile.validate(&limits).is_ok(), "{name} is invalid");
        }
        assert_eq!(list_profiles(), vec!["default", "quick", "soak"]);
    }

    #[test]
    fn test_profile_not_found() {
        let result = load_profile("nonexistent");
        assert!(matches!(result, Err(ProfileError::NotFound { .. })));
    }

    #[test]
    fn test_toml_roundtrip() {
        let profile = load_profile("soak").unwrap();
        let parsed = StressProfile::from_toml(&profile.to_toml()).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let profile = StressProfile::from_toml(
            r#"
            [run]
            duration_secs = 1
            seed = 42

            [shared_rw]
            files = 2
            "#,
        )
        .unwrap();
        assert_eq!(profile.run.duration_secs, 1);
        assert_eq!(profile.run.seed, Some(42));
        assert_eq!(profile.run.pause_max_ms, 19);
        assert_eq!(profile.shared_rw.files, 2);
        assert_eq!(profile.shared_rw.section_size, 16);
        assert_eq!(profile.renamer, RenamerConfig::default());
    }

    #[test]
    fn test_parse_error() {
        let result = StressProfile::from_toml("[run]\nduration_secs = \"soon\"");
        assert!(matches!(result, Err(ProfileError::Parse { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let limits = Limits::new();

        let mut profile = StressProfile::default();
        profile.creator.threads = 0;
        assert!(matches!(profile.validate(&limits), Err(ProfileError::Invalid(_))));

        let mut profile = StressProfile::default();
        profile.shared_rw.file_size = 16;
        assert!(profile.validate(&limits).is_err());

        let mut profile = StressProfile::default();
        profile.run.pause_min_ms = 20;
        assert!(profile.validate(&limits).is_err());

        let mut profile = StressProfile::default();
        profile.workdir.name_len = 2;
        assert!(profile.validate(&limits).is_err());

        let mut profile = StressProfile::default();
        profile.shared_rw.threads_per_file = 1000;
        assert!(matches!(
            profile.validate(&limits),
            Err(ProfileError::Invalid(strain_core::Error::LimitExceeded { .. }))
        ));
    }

    #[test]
    fn test_validate_rejects_huge_duration() {
        let limits = Limits::new();

        let mut profile = StressProfile::default();
        profile.run.duration_secs = u64::MAX / 2;
        assert!(matches!(
            profile.validate(&limits),
            Err(ProfileError::Invalid(strain_core::Error::LimitExceeded {
                limit: "run.duration_secs",
                ..
            }))
        ));

        profile.run.duration_secs = limits.max_duration_secs;
        assert!(profile.validate(&limits).is_ok());
    }
}

//! System limits and configuration bounds.
//!
//! Following TigerStyle: put limits on everything.
//! A stress harness that accepts an unbounded thread count or file size is a
//! harness that takes the host down before it finds a filesystem bug.

use crate::{Error, Result};

/// Upper bounds applied to every tunable knob of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    // Thread limits.
    /// Maximum number of threads a single workload may request.
    pub max_threads_per_workload: u32,

    // Naming limits.
    /// Minimum length of a random file or directory name.
    pub min_name_len: u32,
    /// Maximum length of a random file or directory name.
    pub max_name_len: u32,

    // Payload limits.
    /// Maximum size of a single created file's payload in bytes.
    pub max_payload_bytes: u32,
    /// Maximum number of pre-created shared files.
    pub max_shared_files: u32,
    /// Maximum size of one shared file in bytes.
    pub max_shared_file_bytes: u64,
    /// Maximum size of one shared-file section in bytes.
    pub max_section_bytes: u32,

    // Timing limits.
    /// Maximum pause between two actions (or inside one) in milliseconds.
    pub max_pause_ms: u64,
    /// Maximum length of the action phase in seconds.
    pub max_duration_secs: u64,

    // Populate limits.
    /// Maximum number of files one populate pass creates.
    pub max_populate_files: u64,
    /// Maximum size of one populated file in bytes.
    pub max_populate_file_bytes: u64,
}

impl Limits {
    /// Creates limits with safe defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_threads_per_workload: 1024,

            // Names shorter than 8 letters start colliding inside one run.
            min_name_len: 8,
            max_name_len: 255,

            max_payload_bytes: 1024 * 1024,
            max_shared_files: 256,
            max_shared_file_bytes: 1024 * 1024 * 1024,
            max_section_bytes: 1024 * 1024,

            max_pause_ms: 1000,
            // One week.
            max_duration_secs: 7 * 24 * 60 * 60,

            max_populate_files: 1_000_000,
            max_populate_file_bytes: 64 * 1024 * 1024,
        }
    }

    /// Returns an error if `actual` exceeds `max`.
    ///
    /// # Errors
    /// Returns [`Error::LimitExceeded`] naming `limit`.
    pub const fn check(limit: &'static str, max: u64, actual: u64) -> Result<()> {
        if actual > max {
            return Err(Error::LimitExceeded { limit, max, actual });
        }
        Ok(())
    }

    /// Validates that all limits are internally consistent.
    ///
    /// # Errors
    /// Returns an error if any limits are invalid or inconsistent.
    pub const fn validate(&self) -> Result<()> {
        if self.max_threads_per_workload == 0 {
            return Err(Error::InvalidArgument {
                name: "max_threads_per_workload",
                reason: "must be positive",
            });
        }

        if self.min_name_len == 0 {
            return Err(Error::InvalidArgument {
                name: "min_name_len",
                reason: "must be positive",
            });
        }

        if self.max_name_len < self.min_name_len {
            return Err(Error::InvalidArgument {
                name: "max_name_len",
                reason: "must be >= min_name_len",
            });
        }

        if self.max_duration_secs == 0 {
            return Err(Error::InvalidArgument {
                name: "max_duration_secs",
                reason: "must be positive",
            });
        }

        // A shared file must hold at least one section plus the trailing byte.
        if self.max_shared_file_bytes <= self.max_section_bytes as u64 {
            return Err(Error::InvalidArgument {
                name: "max_shared_file_bytes",
                reason: "must be > max_section_bytes",
            });
        }

        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_valid() {
        let limits = Limits::new();
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_zero_threads_invalid() {
        let mut limits = Limits::new();
        limits.max_threads_per_workload = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_name_range_inverted() {
        let mut limits = Limits::new();
        limits.min_name_len = 32;
        limits.max_name_len = 16;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_file_not_larger_than_section() {
        let mut limits = Limits::new();
        limits.max_section_bytes = 4096;
        limits.max_shared_file_bytes = 4096;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_zero_duration_invalid() {
        let mut limits = Limits::new();
        limits.max_duration_secs = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_check() {
        assert!(Limits::check("threads", 10, 10).is_ok());
        assert_eq!(
            Limits::check("threads", 10, 11),
            Err(Error::LimitExceeded {
                limit: "threads",
                max: 10,
                actual: 11
            })
        );
    }
}

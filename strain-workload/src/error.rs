//! Workload error types.
//!
//! Two things can go wrong inside a workload call: the filesystem refuses an
//! operation outright, or it accepts the operation and later disagrees about
//! what happened. Both are fatal to the run; they are kept apart so reports say
//! which one it was.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;

/// Result type for workload operations.
pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Errors raised by `prepare`, `act`, `verify` or `finish`.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// The filesystem rejected an operation.
    #[error("I/O error: {operation} {}: {source}", path.display())]
    Io {
        /// What operation was being performed.
        operation: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The filesystem state contradicts a recorded outcome.
    #[error(transparent)]
    Verify(#[from] VerifyFailure),
}

impl WorkloadError {
    /// Creates an I/O error.
    pub fn io(operation: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns true if this error is a consistency violation rather than an
    /// I/O failure.
    #[must_use]
    pub const fn is_verification(&self) -> bool {
        matches!(self, Self::Verify(_))
    }

    /// Returns the path the error is about.
    #[must_use]
    pub fn location(&self) -> &Path {
        match self {
            Self::Io { path, .. } => path,
            Self::Verify(failure) => &failure.location,
        }
    }
}

/// A recorded action whose effect does not match the filesystem.
///
/// Immutable once built; carried unchanged from the failing call to the run
/// report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{}] {message}; expected: {expected}; actual: {actual}", location.display())]
pub struct VerifyFailure {
    /// File or directory the check was about.
    pub location: PathBuf,
    /// What went wrong.
    pub message: &'static str,
    /// What the recorded outcome implies.
    pub expected: Evidence,
    /// What the filesystem reported.
    pub actual: Evidence,
}

impl VerifyFailure {
    /// Creates a failure with both sides of the comparison.
    pub fn new(
        location: impl AsRef<Path>,
        message: &'static str,
        expected: Evidence,
        actual: Evidence,
    ) -> Self {
        Self {
            location: location.as_ref().to_path_buf(),
            message,
            expected,
            actual,
        }
    }
}

/// One side of a failed comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// Nothing to show.
    Nothing,
    /// Raw bytes.
    Bytes(Bytes),
    /// A byte count.
    Len(u64),
    /// A directory entry count.
    Entries(u64),
    /// Whether a path exists.
    Exists(bool),
    /// A related path.
    Path(PathBuf),
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => write!(f, "-"),
            Self::Bytes(bytes) => {
                write!(f, "[")?;
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "] ({} bytes)", bytes.len())
            }
            Self::Len(len) => write!(f, "{len} bytes"),
            Self::Entries(count) => write!(f, "{count} entries"),
            Self::Exists(true) => write!(f, "present"),
            Self::Exists(false) => write!(f, "absent"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_failure_display() {
        let failure = VerifyFailure::new(
            "/tmp/abc/file",
            "bytes not equal",
            Evidence::Bytes(Bytes::from_static(&[0x0a, 0xff])),
            Evidence::Bytes(Bytes::from_static(&[0x0a])),
        );
        assert_eq!(
            failure.to_string(),
            "[/tmp/abc/file] bytes not equal; expected: [0a ff] (2 bytes); actual: [0a] (1 bytes)"
        );
    }

    #[test]
    fn test_evidence_display() {
        assert_eq!(Evidence::Nothing.to_string(), "-");
        assert_eq!(Evidence::Len(16).to_string(), "16 bytes");
        assert_eq!(Evidence::Entries(3).to_string(), "3 entries");
        assert_eq!(Evidence::Exists(false).to_string(), "absent");
    }

    #[test]
    fn test_is_verification() {
        let io = WorkloadError::io(
            "write",
            "/nope",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(!io.is_verification());
        assert_eq!(io.location(), Path::new("/nope"));

        let verify: WorkloadError =
            VerifyFailure::new("/x", "gone", Evidence::Exists(true), Evidence::Exists(false))
                .into();
        assert!(verify.is_verification());
        assert_eq!(verify.location(), Path::new("/x"));
    }
}

//! Per-run working directories and random names.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::{Evidence, VerifyFailure, WorkloadError, WorkloadResult};
use crate::fsio;

/// Default length of generated file and directory names.
pub const NAME_LEN_DEFAULT: u32 = 16;

/// Returns `len` random lowercase ASCII letters.
pub fn random_name<R: Rng + ?Sized>(rng: &mut R, len: u32) -> String {
    (0..len).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect()
}

/// A randomly named directory owned by one workload for one run.
///
/// Created by the runner before `prepare` and handed to the workload, which
/// keeps it in its prepared state. Nothing creates it lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    path: PathBuf,
    name_len: u32,
}

impl WorkDir {
    /// Creates a new directory with a random name under `root`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created, including when a
    /// directory of the same name already exists.
    pub fn create<R: Rng + ?Sized>(
        root: &Path,
        name_len: u32,
        rng: &mut R,
    ) -> WorkloadResult<Self> {
        let path = root.join(random_name(rng, name_len));
        std::fs::create_dir(&path).map_err(|e| WorkloadError::io("create_dir", &path, e))?;
        Ok(Self { path, name_len })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a fresh random path inside the directory. Nothing is created.
    pub fn random_path<R: Rng + ?Sized>(&self, rng: &mut R) -> PathBuf {
        self.path.join(random_name(rng, self.name_len))
    }

    /// Removes the directory, which must already be empty.
    ///
    /// # Errors
    /// Returns a verification failure if entries are left behind, or an I/O
    /// error if the removal itself fails.
    pub fn remove(&self) -> WorkloadResult<()> {
        let leftover = fsio::count_entries(&self.path)?;
        if leftover != 0 {
            return Err(VerifyFailure::new(
                &self.path,
                "working directory not empty after cleanup",
                Evidence::Entries(0),
                Evidence::Entries(leftover),
            )
            .into());
        }
        std::fs::remove_dir(&self.path).map_err(|e| WorkloadError::io("remove_dir", &self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::TempDir;

    #[test]
    fn test_random_name_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let name = random_name(&mut rng, NAME_LEN_DEFAULT);
        assert_eq!(name.len(), 16);
        assert!(name.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_random_name_deterministic_per_seed() {
        let a = random_name(&mut ChaCha8Rng::seed_from_u64(7), 16);
        let b = random_name(&mut ChaCha8Rng::seed_from_u64(7), 16);
        let c = random_name(&mut ChaCha8Rng::seed_from_u64(8), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_create_and_remove() {
        let root = TempDir::new().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let dir = WorkDir::create(root.path(), 16, &mut rng).unwrap();
        assert!(dir.path().is_dir());
        assert_eq!(dir.path().parent(), Some(root.path()));

        let file = dir.random_path(&mut rng);
        assert_eq!(file.parent(), Some(dir.path()));
        assert!(!file.exists());

        dir.remove().unwrap();
        assert!(!dir.path().exists());
    }

    #[test]
    fn test_remove_rejects_leftovers() {
        let root = TempDir::new().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let dir = WorkDir::create(root.path(), 16, &mut rng).unwrap();
        std::fs::write(dir.random_path(&mut rng), b"stray").unwrap();

        let err = dir.remove().unwrap_err();
        assert!(err.is_verification());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_create_same_name_twice_fails() {
        let root = TempDir::new().unwrap();
        WorkDir::create(root.path(), 16, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let err = WorkDir::create(root.path(), 16, &mut ChaCha8Rng::seed_from_u64(3)).unwrap_err();
        assert!(!err.is_verification());
    }
}

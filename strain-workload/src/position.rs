//! Position mapping for shared files.
//!
//! Many threads write into the same small set of files at once. Each
//! `(thread, iteration)` pair owns one section of every shared file, laid out
//! row by row:
//!
//! ```text
//! row 0: | t0 | t1 | t2 | ... | tN-1 |
//! row 1: | t0 | t1 | t2 | ... | tN-1 |
//! ...
//! ```
//!
//! Iteration `i` of thread `t` lives in row `i` at column `t`, so
//! `offset = section * t + i * section * threads`. No two pairs share a byte,
//! and the same function recomputes the offset at verification time so it
//! never has to be stored.

use strain_core::{Error, Iteration, Result, ThreadId};

/// Partitioning of a shared file into per-thread sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionLayout {
    section_size: u64,
    thread_count: u32,
    file_size: u64,
    row_stride: u64,
}

impl SectionLayout {
    /// Creates a layout for `thread_count` threads writing `section_size`-byte
    /// sections into files of `file_size` bytes.
    ///
    /// # Errors
    /// Returns an error if any size is zero or the file cannot hold one
    /// section plus the reserved trailing byte.
    pub fn new(section_size: u32, thread_count: u32, file_size: u64) -> Result<Self> {
        if section_size == 0 {
            return Err(Error::InvalidArgument {
                name: "section_size",
                reason: "must be positive",
            });
        }
        if thread_count == 0 {
            return Err(Error::InvalidArgument {
                name: "thread_count",
                reason: "must be positive",
            });
        }
        let section_size = u64::from(section_size);
        if file_size <= section_size {
            return Err(Error::InvalidArgument {
                name: "file_size",
                reason: "must be > section_size",
            });
        }
        let row_stride = section_size
            .checked_mul(u64::from(thread_count))
            .ok_or(Error::InvalidArgument {
                name: "thread_count",
                reason: "section_size * thread_count overflows",
            })?;

        Ok(Self {
            section_size,
            thread_count,
            file_size,
            row_stride,
        })
    }

    /// Returns the section size in bytes.
    #[must_use]
    pub const fn section_size(&self) -> u64 {
        self.section_size
    }

    /// Returns the number of threads sharing the layout.
    #[must_use]
    pub const fn thread_count(&self) -> u32 {
        self.thread_count
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub const fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns the highest offset a section may start at.
    ///
    /// The last byte of the file is never written.
    #[must_use]
    pub const fn last_offset(&self) -> u64 {
        self.file_size - self.section_size - 1
    }

    /// Returns the offset for `thread` at `iteration`, or `None` once the
    /// file is exhausted for that thread.
    ///
    /// Exhaustion is permanent: if iteration `i` maps to `None`, so does
    /// every later iteration of the same thread. A thread outside the layout
    /// always maps to `None`.
    #[must_use]
    pub fn offset(&self, thread: ThreadId, iteration: Iteration) -> Option<u64> {
        if thread.get() >= self.thread_count {
            return None;
        }
        let column = self.section_size * u64::from(thread.get());
        let row = iteration.get().checked_mul(self.row_stride)?;
        let offset = column.checked_add(row)?;
        (offset <= self.last_offset()).then_some(offset)
    }

    /// Returns how many iterations of `thread` map to an offset.
    #[must_use]
    pub fn iterations_per_thread(&self, thread: ThreadId) -> u64 {
        if thread.get() >= self.thread_count {
            return 0;
        }
        let column = self.section_size * u64::from(thread.get());
        if column > self.last_offset() {
            return 0;
        }
        (self.last_offset() - column) / self.row_stride + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_sections(layout: &SectionLayout) -> Vec<(u32, u64, u64)> {
        let mut sections = Vec::new();
        for t in 0..layout.thread_count() {
            let mut i = 0u64;
            while let Some(offset) = layout.offset(ThreadId::new(t), Iteration::new(i)) {
                sections.push((t, i, offset));
                i += 1;
            }
        }
        sections
    }

    #[test]
    fn test_offsets_match_formula() {
        let layout = SectionLayout::new(16, 15, 499_999).unwrap();
        assert_eq!(layout.offset(ThreadId::new(0), Iteration::new(0)), Some(0));
        assert_eq!(layout.offset(ThreadId::new(3), Iteration::new(0)), Some(48));
        assert_eq!(layout.offset(ThreadId::new(0), Iteration::new(1)), Some(240));
        assert_eq!(layout.offset(ThreadId::new(2), Iteration::new(10)), Some(32 + 2400));
    }

    #[test]
    fn test_sections_are_disjoint() {
        let cases = [(16, 15, 4_000), (1, 1, 2), (7, 3, 100), (16, 4, 17), (5, 8, 333)];
        for (section, threads, file) in cases {
            let layout = SectionLayout::new(section, threads, file).unwrap();
            let mut ranges: Vec<(u64, u64)> = all_sections(&layout)
                .into_iter()
                .map(|(_, _, offset)| (offset, offset + layout.section_size()))
                .collect();
            ranges.sort_unstable();

            for pair in ranges.windows(2) {
                assert!(
                    pair[0].1 <= pair[1].0,
                    "overlap {pair:?} for section={section} threads={threads} file={file}"
                );
            }
            for (start, end) in &ranges {
                assert!(*start <= layout.last_offset());
                assert!(*end < file);
            }
        }
    }

    #[test]
    fn test_exhaustion_is_monotonic() {
        let layout = SectionLayout::new(16, 15, 4_000).unwrap();
        for t in 0..15 {
            let thread = ThreadId::new(t);
            let valid = layout.iterations_per_thread(thread);
            for i in 0..valid {
                assert!(layout.offset(thread, Iteration::new(i)).is_some());
            }
            for i in valid..valid + 50 {
                assert!(layout.offset(thread, Iteration::new(i)).is_none());
            }
        }
    }

    #[test]
    fn test_offsets_increase_with_iteration() {
        let layout = SectionLayout::new(16, 3, 10_000).unwrap();
        let thread = ThreadId::new(1);
        let offsets: Vec<u64> = (0..layout.iterations_per_thread(thread))
            .filter_map(|i| layout.offset(thread, Iteration::new(i)))
            .collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_iterations_per_thread_counts_all_sections() {
        let layout = SectionLayout::new(7, 3, 100).unwrap();
        let total: u64 = (0..3)
            .map(|t| layout.iterations_per_thread(ThreadId::new(t)))
            .sum();
        assert_eq!(total, all_sections(&layout).len() as u64);
    }

    #[test]
    fn test_huge_iteration_does_not_overflow() {
        let layout = SectionLayout::new(16, 15, 499_999).unwrap();
        assert_eq!(layout.offset(ThreadId::new(1), Iteration::new(u64::MAX)), None);
    }

    #[test]
    fn test_thread_outside_layout() {
        let layout = SectionLayout::new(16, 3, 1_000).unwrap();
        assert_eq!(layout.offset(ThreadId::new(3), Iteration::new(0)), None);
        assert_eq!(layout.iterations_per_thread(ThreadId::new(3)), 0);
    }

    #[test]
    fn test_file_too_small() {
        assert!(SectionLayout::new(16, 1, 16).is_err());
        assert!(SectionLayout::new(16, 1, 17).is_ok());
        assert!(SectionLayout::new(0, 1, 17).is_err());
        assert!(SectionLayout::new(16, 0, 17).is_err());
    }

    #[test]
    fn test_columns_beyond_last_offset() {
        // Only threads 0 and 1 fit: last offset is 100 - 40 - 1 = 59.
        let layout = SectionLayout::new(40, 4, 100).unwrap();
        assert_eq!(layout.iterations_per_thread(ThreadId::new(0)), 1);
        assert_eq!(layout.iterations_per_thread(ThreadId::new(1)), 1);
        assert_eq!(layout.iterations_per_thread(ThreadId::new(2)), 0);
        assert_eq!(layout.offset(ThreadId::new(2), Iteration::new(0)), None);
    }
}

//! Strongly-typed identifiers for harness entities.
//!
//! Following `TigerStyle`: explicit types prevent bugs from mixing up a thread
//! slot with an iteration counter, both of which are small integers that flow
//! through the same call sites.

use std::fmt;

/// Macro to generate strongly-typed ID wrappers.
///
/// Each ID type wraps an unsigned integer and provides:
/// - Type safety (can't pass an `Iteration` where a `ThreadId` is expected)
/// - Debug/Display formatting
/// - Zero-cost abstraction (same as the raw integer)
macro_rules! define_id {
    ($name:ident, $repr:ty, $prefix:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name($repr);

        impl $name {
            /// Creates a new ID from a raw value.
            #[inline]
            #[must_use]
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            #[inline]
            #[must_use]
            pub const fn get(self) -> $repr {
                self.0
            }

            /// Returns the next ID in sequence.
            ///
            /// # Panics
            /// Panics if the ID would overflow.
            #[inline]
            #[must_use]
            pub const fn next(self) -> Self {
                assert!(self.0 < <$repr>::MAX, "ID overflow");
                Self(self.0 + 1)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for $repr {
            fn from(id: $name) -> Self {
                id.get()
            }
        }
    };
}

define_id!(ThreadId, u32, "thread", "Zero-based thread slot within one workload.");
define_id!(Iteration, u64, "iter", "Zero-based per-thread iteration counter.");
define_id!(
    WorkloadIndex,
    u32,
    "workload",
    "Position of a workload in the registry, as typed on the command line."
);

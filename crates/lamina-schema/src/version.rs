use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

///
/// SchemaVersion
///
/// Ordered triple; total order is lexicographic over (major, minor, patch).
/// Field order is load-bearing for the derived `Ord`.
///

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct SchemaVersion {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
}

impl SchemaVersion {
    /// The version of a store that has never been migrated.
    pub const ZERO: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(major: i64, minor: i64, patch: i64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

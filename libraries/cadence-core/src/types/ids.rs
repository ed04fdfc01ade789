/// ID types for Cadence entities
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Track identifier
///
/// Stable integer assigned by the library. The persisted snapshot and the
/// play-count store both key on its decimal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(i64);

impl TrackId {
    /// Create a new track ID
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner integer
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TrackId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for TrackId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

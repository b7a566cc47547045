//! This module defines [`Height`].

use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// A height on a counterparty chain, expressed as a `(revision_number, revision_height)` pair.
///
/// Heights are ordered lexicographically: a higher revision always wins regardless of the
/// revision height. The zero height is used as a sentinel for "unset" (e.g. a disabled
/// timeout height).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Height {
    /// The revision (epoch) number
    pub revision_number: u64,
    /// The height within the revision
    pub revision_height: u64,
}

impl Height {
    /// The zero height.
    pub const ZERO: Self = Self::new(0, 0);

    /// Creates a new height.
    #[must_use]
    pub const fn new(revision_number: u64, revision_height: u64) -> Self {
        Self {
            revision_number,
            revision_height,
        }
    }

    /// Returns true if both components are zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.revision_number == 0 && self.revision_height == 0
    }

    /// Returns the next height within the same revision.
    #[must_use]
    pub const fn increment(self) -> Self {
        Self::new(self.revision_number, self.revision_height + 1)
    }

    /// Returns the height `delta` blocks after this one, within the same revision.
    #[must_use]
    pub const fn add_blocks(self, delta: u64) -> Self {
        Self::new(self.revision_number, self.revision_height.saturating_add(delta))
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

impl FromStr for Height {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, height) = s
            .split_once('-')
            .ok_or_else(|| TypesError::InvalidHeight(s.to_string()))?;
        let revision_number = number
            .parse()
            .map_err(|_| TypesError::InvalidHeight(s.to_string()))?;
        let revision_height = height
            .parse()
            .map_err(|_| TypesError::InvalidHeight(s.to_string()))?;
        Ok(Self::new(revision_number, revision_height))
    }
}

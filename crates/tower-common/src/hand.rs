//! Identifiers for the two independently driven hand sets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which hand set a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandId {
    /// First hand set (first relay).
    One,
    /// Second hand set (second relay).
    Two,
}

impl HandId {
    /// Both hands in dispatch order.
    pub const ALL: [HandId; 2] = [HandId::One, HandId::Two];

    /// Array index for per-hand storage.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }
}

impl fmt::Display for HandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "ONE"),
            Self::Two => write!(f, "TWO"),
        }
    }
}

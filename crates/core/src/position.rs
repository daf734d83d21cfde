//! Store-assigned log positions.

use serde::{Deserialize, Serialize};

/// Position of an event in the store's log.
///
/// Ordered by `commit` first, then `prepare`. Stores with a single counter
/// use the same value for both.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    commit: u64,
    prepare: u64,
}

impl Position {
    pub const START: Position = Position {
        commit: 0,
        prepare: 0,
    };

    pub fn new(commit: u64, prepare: u64) -> Self {
        Self { commit, prepare }
    }

    /// Position for stores that number events with a single counter.
    pub fn from_event_number(number: u64) -> Self {
        Self::new(number, number)
    }

    pub fn commit(&self) -> u64 {
        self.commit
    }

    pub fn prepare(&self) -> u64 {
        self.prepare
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "C:{}/P:{}", self.commit, self.prepare)
    }
}

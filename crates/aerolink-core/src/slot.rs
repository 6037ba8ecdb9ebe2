//! Named time slots of the four-slot field ring.

use serde::{Deserialize, Serialize};

/// A time level relative to the current driver step `n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeSlot {
    /// Step `n - 2`.
    Nm2,
    /// Step `n - 1`.
    Nm1,
    /// Step `n`, the last accepted state.
    N,
    /// Step `n + 1`, the state being computed.
    Np1,
}

impl TimeSlot {
    /// Every slot, oldest first.
    pub const ALL: [TimeSlot; 4] = [TimeSlot::Nm2, TimeSlot::Nm1, TimeSlot::N, TimeSlot::Np1];

    /// Position of the slot counted from the oldest, `0..4`.
    pub fn offset(self) -> usize {
        self as usize
    }

    /// Time of this slot relative to step `n`, in driver steps.
    pub fn step_offset(self) -> i64 {
        self as i64 - 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_ordered() {
        let offsets: Vec<_> = TimeSlot::ALL.iter().map(|s| s.step_offset()).collect();
        assert_eq!(offsets, vec![-2, -1, 0, 1]);
        assert_eq!(TimeSlot::Np1.offset(), 3);
    }
}

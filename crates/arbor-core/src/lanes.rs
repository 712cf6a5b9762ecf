//! Priority lanes.
//!
//! A lane is a single bit; a set of pending lanes is their union. Lower bits
//! are more urgent.

use bitflags::bitflags;

use crate::platform::Priority;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Lanes: u32 {
        const SYNC = 0b0_0001;
        const INPUT_CONTINUOUS = 0b0_0010;
        const DEFAULT = 0b0_0100;
        const TRANSITION = 0b0_1000;
        const IDLE = 0b1_0000;
    }
}

pub type Lane = Lanes;

pub const NO_LANE: Lane = Lanes::empty();

impl Lanes {
    /// The most urgent lane in the set, or [`NO_LANE`].
    pub fn highest_priority(self) -> Lane {
        let bits = self.bits();
        Lanes::from_bits_retain(bits & bits.wrapping_neg())
    }

    pub fn merge(self, other: Lanes) -> Lanes {
        self | other
    }

    pub fn is_subset_of(self, set: Lanes) -> bool {
        !self.is_empty() && set.contains(self)
    }
}

/// Maps a lane to the scheduler priority it is rendered at.
pub fn lane_to_priority(lane: Lane) -> Priority {
    let lane = lane.highest_priority();
    if lane == Lanes::SYNC {
        Priority::Immediate
    } else if lane == Lanes::INPUT_CONTINUOUS {
        Priority::UserBlocking
    } else if lane == Lanes::DEFAULT {
        Priority::Normal
    } else if lane == Lanes::TRANSITION {
        Priority::Low
    } else {
        Priority::Idle
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_priority_picks_the_lowest_bit() {
        let pending = Lanes::TRANSITION | Lanes::DEFAULT | Lanes::IDLE;
        assert_eq!(pending.highest_priority(), Lanes::DEFAULT);
        assert_eq!(NO_LANE.highest_priority(), NO_LANE);
    }

    #[test]
    fn empty_lane_is_never_a_subset() {
        assert!(Lanes::SYNC.is_subset_of(Lanes::SYNC | Lanes::DEFAULT));
        assert!(!Lanes::TRANSITION.is_subset_of(Lanes::SYNC | Lanes::DEFAULT));
        assert!(!NO_LANE.is_subset_of(Lanes::all()));
    }

    #[test]
    fn lanes_map_to_decreasing_priorities() {
        let priorities: Vec<Priority> = [
            Lanes::SYNC,
            Lanes::INPUT_CONTINUOUS,
            Lanes::DEFAULT,
            Lanes::TRANSITION,
            Lanes::IDLE,
        ]
        .into_iter()
        .map(lane_to_priority)
        .collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
        assert_eq!(lane_to_priority(Lanes::SYNC | Lanes::IDLE), Priority::Immediate);
    }
}

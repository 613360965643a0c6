//! Emergency preemption monitor
//!
//! Watches the lanes for emergency vehicles that have not crossed yet. The
//! monitor only flips the shared emergency flags; the signal controller reads
//! them and performs the actual preemption.

use super::lanes::LaneSet;
use super::types::Direction;

/// Flags shared between the monitor, the generator and the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmergencyState {
    pub active: bool,
    pub direction: Option<Direction>,
}

impl EmergencyState {
    pub fn raise(&mut self, direction: Direction) {
        self.active = true;
        self.direction = Some(direction);
    }

    pub fn clear(&mut self) {
        self.active = false;
        self.direction = None;
    }

    /// Direction that must be given right of way, if any
    pub fn target(&self) -> Option<Direction> {
        if self.active {
            self.direction
        } else {
            None
        }
    }
}

/// Emergency state transition observed by one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyTransition {
    Detected(Direction),
    /// The recorded direction has no waiting emergency vehicle left, another one does
    Retargeted { from: Direction, to: Direction },
    Cleared { previous: Option<Direction> },
}

#[derive(Debug, Default)]
pub struct PreemptionMonitor;

impl PreemptionMonitor {
    pub fn new() -> Self {
        Self
    }

    fn waiting_in(lanes: &LaneSet, direction: Direction) -> bool {
        lanes
            .lanes_of(direction)
            .iter()
            .flatten()
            .any(|v| v.is_emergency() && !v.crossed)
    }

    /// First direction, in cycle order, with an emergency vehicle still waiting
    pub fn find_waiting(lanes: &LaneSet) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|direction| Self::waiting_in(lanes, *direction))
    }

    pub fn scan(&self, lanes: &LaneSet, state: &mut EmergencyState) -> Option<EmergencyTransition> {
        let found = Self::find_waiting(lanes);

        match (found, state.active) {
            (Some(direction), false) => {
                state.raise(direction);
                Some(EmergencyTransition::Detected(direction))
            }
            (Some(direction), true) => match state.direction {
                Some(current) if current != direction && !Self::waiting_in(lanes, current) => {
                    state.raise(direction);
                    Some(EmergencyTransition::Retargeted {
                        from: current,
                        to: direction,
                    })
                }
                None => {
                    state.raise(direction);
                    Some(EmergencyTransition::Detected(direction))
                }
                _ => None,
            },
            (None, true) => {
                let previous = state.direction;
                state.clear();
                Some(EmergencyTransition::Cleared { previous })
            }
            (None, false) => None,
        }
    }
}

//! Stalled-vehicle detection
//!
//! Only lane-first vehicles that have not crossed and currently hold a green
//! (not yellow) light are checked. A stall is measured from the later of the
//! vehicle's last move and the start of the current green, so time spent
//! waiting at red never counts. Each vehicle is reported at most once.

use super::controller::PhaseSnapshot;
use super::lanes::LaneSet;
use super::types::{Direction, VehicleCategory, VehicleId, LANES_PER_DIRECTION};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anomaly {
    pub vehicle: VehicleId,
    pub direction: Direction,
    pub lane: usize,
    pub category: VehicleCategory,
    pub stalled_seconds: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector {
    pub threshold_secs: f64,
}

impl AnomalyDetector {
    pub fn new(threshold_secs: f64) -> Self {
        Self { threshold_secs }
    }

    pub fn scan(
        &self,
        lanes: &mut LaneSet,
        phase: &PhaseSnapshot,
        green_since: f64,
        now: f64,
    ) -> Vec<Anomaly> {
        let mut found = Vec::new();

        for direction in Direction::ALL {
            if !phase.is_green(direction) {
                continue;
            }
            for lane in 0..LANES_PER_DIRECTION {
                let Some(leader) = lanes.lane_mut(direction, lane).first_mut() else {
                    continue;
                };
                if leader.crossed || leader.anomaly_reported {
                    continue;
                }

                let stalled = now - leader.last_moved_at.max(green_since);
                if stalled >= self.threshold_secs {
                    leader.anomaly_reported = true;
                    found.push(Anomaly {
                        vehicle: leader.id,
                        direction,
                        lane,
                        category: leader.category,
                        stalled_seconds: stalled,
                    });
                }
            }
        }

        found
    }
}

//! Vehicle motion engine
//!
//! Advances every live vehicle by one motion step against an immutable
//! snapshot of the signal phase, records stop-line crossings and removes
//! vehicles that left the canvas.

use log::debug;

use super::controller::PhaseSnapshot;
use super::geometry::Approach;
use super::lanes::LaneSet;
use super::types::{Direction, VehicleId, LANES_PER_DIRECTION};
use super::vehicle::{MotionRules, VehicleUpdate};

/// What happened during one motion step
#[derive(Debug, Default, Clone)]
pub struct MotionReport {
    /// Crossings in lane order, per lane
    pub crossed: Vec<(Direction, usize, VehicleId)>,
    pub exited: Vec<VehicleId>,
}

/// Update all vehicles in the simulation
pub fn advance_vehicles(
    lanes: &mut LaneSet,
    approaches: &[Approach; 4],
    phase: &PhaseSnapshot,
    rules: &MotionRules,
    now: f64,
) -> MotionReport {
    let mut report = MotionReport::default();

    for direction in Direction::ALL {
        let approach = &approaches[direction.index()];
        let green = phase.is_green(direction);

        for lane_index in 0..LANES_PER_DIRECTION {
            let lane = lanes.lane_mut(direction, lane_index);
            let mut exited = Vec::new();

            for i in 0..lane.len() {
                let (front, rest) = lane.split_at_mut(i);
                let vehicle = &mut rest[0];
                match vehicle.update(front.last(), approach, green, rules, now) {
                    VehicleUpdate::Continue => {}
                    VehicleUpdate::Crossed => {
                        report.crossed.push((direction, lane_index, vehicle.id));
                    }
                    VehicleUpdate::Exited => exited.push(vehicle.id),
                }
            }

            if !exited.is_empty() {
                lane.retain(|v| !exited.contains(&v.id));
                debug!(
                    "{} vehicle(s) left the {} approach, lane {}",
                    exited.len(),
                    direction,
                    lane_index
                );
                report.exited.extend(exited);
            }
        }
    }

    for (direction, _, _) in &report.crossed {
        lanes.record_crossing(*direction);
    }

    report
}

//! Lane storage for the four approaches
//!
//! Each lane is a FIFO: vehicles are appended at the tail on spawn and only
//! ever removed once they have left the canvas. Order is never changed.

use super::types::{Direction, LANES_PER_DIRECTION};
use super::vehicle::Vehicle;

#[derive(Debug, Default)]
pub struct LaneSet {
    lanes: [[Vec<Vehicle>; LANES_PER_DIRECTION]; 4],
    crossed: [u32; 4],
}

impl LaneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lane(&self, direction: Direction, lane: usize) -> &[Vehicle] {
        &self.lanes[direction.index()][lane]
    }

    pub fn lane_mut(&mut self, direction: Direction, lane: usize) -> &mut Vec<Vehicle> {
        &mut self.lanes[direction.index()][lane]
    }

    pub fn lanes_of(&self, direction: Direction) -> &[Vec<Vehicle>; LANES_PER_DIRECTION] {
        &self.lanes[direction.index()]
    }

    pub fn tail(&self, direction: Direction, lane: usize) -> Option<&Vehicle> {
        self.lanes[direction.index()][lane].last()
    }

    pub fn push(&mut self, vehicle: Vehicle) {
        self.lanes[vehicle.direction.index()][vehicle.lane].push(vehicle);
    }

    /// Throughput counter: vehicles whose leading edge passed the stop line
    pub fn crossed(&self, direction: Direction) -> u32 {
        self.crossed[direction.index()]
    }

    pub fn record_crossing(&mut self, direction: Direction) {
        self.crossed[direction.index()] += 1;
    }

    pub fn total_crossed(&self) -> u32 {
        self.crossed.iter().sum()
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.lanes[direction.index()].iter().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        Direction::ALL.iter().map(|d| self.count(*d)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.lanes.iter().flatten().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vehicle> {
        self.lanes.iter_mut().flatten().flatten()
    }
}

//! Stochastic traffic generator
//!
//! Draws one vehicle per spawn period: category, direction, lane and turn
//! assignment. The generator only produces requests; the world places them.

use std::time::Duration;

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tokio::sync::mpsc;

use super::config::TrafficConfig;
use super::types::{Direction, VehicleCategory, BIKE_LANE, TURN_LANE};

/// A vehicle to be placed at the tail of its lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnRequest {
    pub category: VehicleCategory,
    pub direction: Direction,
    pub lane: usize,
    pub will_turn: bool,
}

impl SpawnRequest {
    pub fn new(category: VehicleCategory, direction: Direction, lane: usize) -> Self {
        Self {
            category,
            direction,
            lane,
            will_turn: false,
        }
    }

    pub fn turning(mut self) -> Self {
        self.will_turn = true;
        self
    }
}

pub struct TrafficGenerator {
    config: TrafficConfig,
    /// Optional seeded RNG for reproducible runs
    rng: Option<StdRng>,
}

impl TrafficGenerator {
    pub fn new(config: TrafficConfig) -> Self {
        Self { config, rng: None }
    }

    pub fn new_with_seed(config: TrafficConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Some(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn config(&self) -> &TrafficConfig {
        &self.config
    }

    /// Uniform value in [0, 1), using the seeded RNG if available
    fn roll(&mut self) -> f64 {
        match &mut self.rng {
            Some(rng) => rng.random_range(0.0..1.0),
            None => rand::rng().random_range(0.0..1.0),
        }
    }

    /// Uniform integer in [0, upper)
    fn pick(&mut self, upper: u32) -> u32 {
        match &mut self.rng {
            Some(rng) => rng.random_range(0..upper),
            None => rand::rng().random_range(0..upper),
        }
    }

    fn draw_category(&mut self) -> VehicleCategory {
        if self.roll() < self.config.emergency_probability {
            return VehicleCategory::Emergency;
        }
        let index = self.pick(VehicleCategory::GENERAL.len() as u32) as usize;
        VehicleCategory::GENERAL[index]
    }

    fn draw_direction(&mut self) -> Direction {
        let weights = self.config.direction_weights.as_array();
        let total: u32 = weights.iter().sum();
        if total == 0 {
            return Direction::North;
        }

        let mut ticket = self.pick(total);
        for direction in Direction::ALL {
            let weight = weights[direction.index()];
            if ticket < weight {
                return direction;
            }
            ticket -= weight;
        }
        Direction::West
    }

    pub fn draw(&mut self) -> SpawnRequest {
        let category = self.draw_category();
        let direction = self.draw_direction();
        let lane = if category == VehicleCategory::Bike {
            BIKE_LANE
        } else {
            1 + self.pick(2) as usize
        };
        let will_turn = lane == TURN_LANE && self.roll() < self.config.turn_probability;

        SpawnRequest {
            category,
            direction,
            lane,
            will_turn,
        }
    }

    /// Emit one request per period until the receiving side goes away
    pub async fn run(mut self, spawns: mpsc::Sender<SpawnRequest>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let request = self.draw();
            if spawns.send(request).await.is_err() {
                debug!("Spawn channel closed; generator stopping");
                break;
            }
        }
    }
}

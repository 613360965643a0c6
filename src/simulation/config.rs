//! Simulation configuration
//!
//! Every field has a default, so an empty TOML file (or no file at all) gives
//! the stock intersection. Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use super::delivery::SpillLog;
use super::signal::SignalTiming;
use super::types::Direction;
use super::vehicle::MotionRules;

/// Slowest accepted speed-up of simulated time against the wall clock
pub const MIN_TIME_SCALE: f64 = 1e-3;
/// Fastest accepted speed-up of simulated time against the wall clock
pub const MAX_TIME_SCALE: f64 = 1e4;

/// Relative traffic share of each direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionWeights {
    pub north: u32,
    pub east: u32,
    pub south: u32,
    pub west: u32,
}

impl Default for DirectionWeights {
    fn default() -> Self {
        Self {
            north: 400,
            east: 100,
            south: 100,
            west: 400,
        }
    }
}

impl DirectionWeights {
    /// Weights indexed by `Direction::index`
    pub fn as_array(&self) -> [u32; 4] {
        [self.north, self.east, self.south, self.west]
    }

    pub fn get(&self, direction: Direction) -> u32 {
        self.as_array()[direction.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Seconds between two spawns
    pub spawn_interval_secs: f64,
    pub emergency_probability: f64,
    /// Chance that a vehicle in the outer general lane turns
    pub turn_probability: f64,
    pub direction_weights: DirectionWeights,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            spawn_interval_secs: 0.75,
            emergency_probability: 0.01,
            turn_probability: 0.6,
            direction_weights: DirectionWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Motion steps per simulated second
    pub steps_per_second: u32,
    pub stopping_gap: f32,
    pub moving_gap: f32,
    /// Degrees per rotation step
    pub rotation_step: f32,
    /// Degrees after which a turn is complete
    pub rotation_threshold: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            steps_per_second: 60,
            stopping_gap: 15.0,
            moving_gap: 15.0,
            rotation_step: 3.0,
            rotation_threshold: 90.0,
        }
    }
}

impl MotionConfig {
    pub fn rules(&self) -> MotionRules {
        MotionRules {
            stopping_gap: self.stopping_gap,
            moving_gap: self.moving_gap,
            rotation_step: self.rotation_step,
            rotation_threshold: self.rotation_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Collector URL; without one every event goes to the spill file
    pub endpoint: Option<String>,
    pub spill_path: PathBuf,
    pub timeout_ms: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            spill_path: SpillLog::default_path(),
            timeout_ms: 500,
        }
    }
}

impl EventConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub timing: SignalTiming,
    pub traffic: TrafficConfig,
    pub motion: MotionConfig,
    pub anomaly_threshold_secs: f64,
    pub events: EventConfig,
    /// Root of `<direction>/<category>.png` sprites
    pub assets_dir: Option<PathBuf>,
    /// JSON-lines file with externally detected queue counts
    pub counts_feed: Option<PathBuf>,
    pub seed: Option<u64>,
    /// Simulated seconds to run; 0 runs until interrupted
    pub duration_secs: u64,
    /// Simulated seconds per wall-clock second
    pub time_scale: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            timing: SignalTiming::default(),
            traffic: TrafficConfig::default(),
            motion: MotionConfig::default(),
            anomaly_threshold_secs: 20.0,
            events: EventConfig::default(),
            assets_dir: None,
            counts_feed: None,
            seed: None,
            duration_secs: 100,
            time_scale: 1.0,
        }
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SimConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let timing = &self.timing;
        ensure!(
            timing.minimum <= timing.maximum,
            "minimum green {}s exceeds maximum green {}s",
            timing.minimum,
            timing.maximum
        );
        ensure!(timing.minimum > 0, "minimum green must be positive");
        ensure!(
            self.motion.steps_per_second > 0,
            "motion steps per second must be positive"
        );
        ensure!(
            self.traffic.spawn_interval_secs > 0.0,
            "spawn interval must be positive"
        );
        ensure!(
            (MIN_TIME_SCALE..=MAX_TIME_SCALE).contains(&self.time_scale),
            "time scale {} outside [{}, {}]",
            self.time_scale,
            MIN_TIME_SCALE,
            MAX_TIME_SCALE
        );
        ensure!(
            (0.0..=1.0).contains(&self.traffic.emergency_probability),
            "emergency probability must lie in [0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&self.traffic.turn_probability),
            "turn probability must lie in [0, 1]"
        );
        ensure!(
            self.traffic.direction_weights.as_array().iter().any(|w| *w > 0),
            "at least one direction needs a positive traffic weight"
        );
        ensure!(
            self.anomaly_threshold_secs > 0.0,
            "anomaly threshold must be positive"
        );
        Ok(())
    }
}

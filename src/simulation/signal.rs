//! Per-direction signal counters and the timing constants that seed them

use serde::{Deserialize, Serialize};

/// Signal timing in seconds (one signal tick per second)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalTiming {
    pub default_red: u32,
    pub default_yellow: u32,
    pub default_green: u32,
    /// Lower bound of any computed green
    pub minimum: u32,
    /// Upper bound of any computed green
    pub maximum: u32,
    /// Red ticks left on the next direction when its green is computed
    pub detection_lead: u32,
    /// General-purpose lanes per direction, used by the green-time formula
    pub lane_count: u32,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            default_red: 150,
            default_yellow: 5,
            default_green: 20,
            minimum: 10,
            maximum: 60,
            detection_lead: 5,
            lane_count: 2,
        }
    }
}

impl SignalTiming {
    pub fn clamp_green(&self, green: u32) -> u32 {
        green.clamp(self.minimum, self.maximum)
    }

    pub fn in_bounds(&self, green: u32) -> bool {
        (self.minimum..=self.maximum).contains(&green)
    }
}

/// Remaining time of each light for one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalPhase {
    pub red: u32,
    pub yellow: u32,
    pub green: u32,
    /// Seconds this direction has spent green since the start
    pub total_green_time: u32,
}

impl SignalPhase {
    pub fn new(red: u32, yellow: u32, green: u32) -> Self {
        Self {
            red,
            yellow,
            green,
            total_green_time: 0,
        }
    }

    /// Restore default counters, keeping the accumulated green time
    pub fn reset(&mut self, timing: &SignalTiming) {
        self.red = timing.default_red;
        self.yellow = timing.default_yellow;
        self.green = timing.default_green;
    }

    pub fn set(&mut self, red: u32, yellow: u32, green: u32) {
        self.red = red;
        self.yellow = yellow;
        self.green = green;
    }
}

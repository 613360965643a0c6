//! Green-time estimation for the next phase
//!
//! The controller asks for the upcoming direction's green duration a few
//! ticks before the switch. The estimate runs off the tick loop: on a
//! blocking worker when a tokio runtime is available, inline otherwise. The
//! controller polls the result and keeps its current value if nothing valid
//! arrives in time.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use super::error::{SimError, SimResult};
use super::feed::CountsFeed;
use super::signal::SignalTiming;
use super::types::{Direction, VehicleCategory, LANES_PER_DIRECTION};
use super::vehicle::Vehicle;

/// Per-category vehicle counts for one direction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueCounts(BTreeMap<VehicleCategory, u32>);

impl QueueCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: VehicleCategory, count: u32) -> Self {
        self.add(category, count);
        self
    }

    pub fn add(&mut self, category: VehicleCategory, count: u32) {
        *self.0.entry(category).or_insert(0) += count;
    }

    pub fn get(&self, category: VehicleCategory) -> u32 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VehicleCategory, u32)> + '_ {
        self.0.iter().map(|(category, count)| (*category, *count))
    }

    pub fn merge(&mut self, other: &QueueCounts) {
        for (category, count) in other.iter() {
            self.add(category, count);
        }
    }

    /// Count vehicles still waiting before the stop line
    pub fn from_lanes(lanes: &[Vec<Vehicle>; LANES_PER_DIRECTION]) -> Self {
        let mut counts = Self::new();
        for vehicle in lanes.iter().flatten().filter(|v| !v.crossed) {
            counts.add(vehicle.category, 1);
        }
        counts
    }
}

/// Strategy that turns queue counts into a green duration
pub trait GreenTimePolicy: Send + Sync {
    fn green_time(&self, counts: &QueueCounts, timing: &SignalTiming) -> SimResult<u32>;
}

/// Load-adaptive default: weighted queue length spread over the lanes
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedQueuePolicy;

impl GreenTimePolicy for WeightedQueuePolicy {
    fn green_time(&self, counts: &QueueCounts, timing: &SignalTiming) -> SimResult<u32> {
        Ok(weighted_green_time(counts, timing))
    }
}

/// `ceil(sum(count * pass_time) / (lane_count + 1))`, clamped to the bounds
pub fn weighted_green_time(counts: &QueueCounts, timing: &SignalTiming) -> u32 {
    let weighted: f64 = counts
        .iter()
        .filter_map(|(category, count)| category.pass_time().map(|t| count as f64 * t))
        .sum();
    let raw = (weighted / (timing.lane_count as f64 + 1.0)).ceil();
    let raw = if raw.is_finite() && raw > 0.0 {
        raw.min(u32::MAX as f64) as u32
    } else {
        0
    };
    timing.clamp_green(raw)
}

/// Where the counts for an estimate come from
pub enum CountsSource {
    /// Snapshot of the engine's own lanes, taken on the tick
    Local(QueueCounts),
    /// Externally registered provider, queried off the tick loop
    Feed {
        feed: Arc<dyn CountsFeed>,
        current: Option<Direction>,
    },
}

/// One green-time estimate to run
pub struct GreenTimeJob {
    pub direction: Direction,
    pub source: CountsSource,
    pub policy: Arc<dyn GreenTimePolicy>,
    pub timing: SignalTiming,
}

impl GreenTimeJob {
    pub fn run(self) -> SimResult<u32> {
        let counts = match self.source {
            CountsSource::Local(counts) => counts,
            CountsSource::Feed { feed, current } => {
                match feed.latest(current, self.direction) {
                    Ok(record) => record.counts_for(self.direction),
                    Err(e) => {
                        warn!(
                            "No usable queue counts for {} ({}); assuming an empty queue",
                            self.direction, e
                        );
                        QueueCounts::new()
                    }
                }
            }
        };
        self.policy.green_time(&counts, &self.timing)
    }
}

/// An estimate that may still be running
#[derive(Debug)]
pub struct PendingGreenTime {
    pub direction: Direction,
    rx: oneshot::Receiver<SimResult<u32>>,
}

impl PendingGreenTime {
    pub fn dispatch(job: GreenTimeJob) -> Self {
        let direction = job.direction;
        let (tx, rx) = oneshot::channel();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    let _ = tx.send(job.run());
                });
            }
            Err(_) => {
                let _ = tx.send(job.run());
            }
        }
        Self { direction, rx }
    }

    /// `None` while the estimate is still running
    pub fn poll(&mut self) -> Option<SimResult<u32>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(SimError::Policy(
                "green-time computation was abandoned".into(),
            ))),
        }
    }
}

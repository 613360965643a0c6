//! Intersection simulation engine
//!
//! Signal control, vehicle motion, emergency preemption and stall detection
//! for a single four-way intersection. Nothing in here draws or serves
//! anything; state changes leave the engine as structured events.

mod anomaly;
mod assets;
mod config;
mod control;
mod controller;
mod delivery;
mod emergency;
mod error;
mod events;
mod feed;
mod generator;
mod geometry;
mod green_time;
mod lanes;
mod motion;
mod signal;
mod types;
mod vehicle;
mod world;

pub use anomaly::{Anomaly, AnomalyDetector};
pub use assets::{AssetCatalog, Resolved, Sprite};
pub use config::{
    DirectionWeights, EventConfig, MotionConfig, SimConfig, TrafficConfig, MAX_TIME_SCALE,
    MIN_TIME_SCALE,
};
pub use control::ControlCommand;
pub use controller::{
    ChangeReason, PhaseChange, PhaseSnapshot, SignalController, TickOutcome, MANUAL_CROSS_RED_SECS,
    MANUAL_GREEN_SECS, MANUAL_RED_SECS,
};
pub use delivery::{
    run_delivery, run_delivery_with_cutoff, DeliveryStats, HttpEndpoint, SpillLog,
};
pub use emergency::{EmergencyState, EmergencyTransition, PreemptionMonitor};
pub use error::{SimError, SimResult};
pub use events::{replay_cycle, Event, EventKind, EventSink, DEFAULT_JOURNAL_LIMIT};
pub use feed::{CountsFeed, JsonlCountsFeed, QueueRecord};
pub use generator::{SpawnRequest, TrafficGenerator};
pub use geometry::{approaches, Approach, CANVAS_HEIGHT, CANVAS_WIDTH};
pub use green_time::{
    weighted_green_time, CountsSource, GreenTimeJob, GreenTimePolicy, PendingGreenTime,
    QueueCounts, WeightedQueuePolicy,
};
pub use lanes::LaneSet;
pub use motion::{advance_vehicles, MotionReport};
pub use signal::{SignalPhase, SignalTiming};
pub use types::{
    Axis, Direction, Heading, Light, Position, VehicleCategory, VehicleId, BIKE_LANE,
    LANES_PER_DIRECTION, TURN_LANE,
};
pub use vehicle::{MotionRules, TurnState, Vehicle, VehicleUpdate};
pub use world::SimWorld;

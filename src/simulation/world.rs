//! Simulation world that ties everything together
//!
//! `SimWorld` is the single owner of lanes, signal state and emergency flags.
//! One `step` is one motion step; every `steps_per_second` steps the signal
//! controller advances by one second.

use std::sync::Arc;

use log::{info, warn};
use serde_json::json;

use super::anomaly::AnomalyDetector;
use super::assets::{AssetCatalog, Sprite};
use super::config::SimConfig;
use super::control::ControlCommand;
use super::controller::{PhaseChange, SignalController};
use super::emergency::{EmergencyState, EmergencyTransition, PreemptionMonitor};
use super::error::{SimError, SimResult};
use super::events::{EventKind, EventSink};
use super::feed::{CountsFeed, JsonlCountsFeed};
use super::generator::SpawnRequest;
use super::geometry::{approaches, Approach};
use super::green_time::{
    CountsSource, GreenTimeJob, GreenTimePolicy, PendingGreenTime, QueueCounts,
    WeightedQueuePolicy,
};
use super::lanes::LaneSet;
use super::motion::{advance_vehicles, MotionReport};
use super::types::{Direction, Light, VehicleCategory, VehicleId};
use super::vehicle::{MotionRules, Vehicle};

/// The main simulation world
pub struct SimWorld {
    config: SimConfig,
    lanes: LaneSet,
    controller: SignalController,
    emergency: EmergencyState,
    monitor: PreemptionMonitor,
    anomaly: AnomalyDetector,
    approaches: [Approach; 4],
    rules: MotionRules,
    assets: AssetCatalog,
    events: EventSink,
    policy: Arc<dyn GreenTimePolicy>,
    /// External queue counts; the world's own lanes are used when absent
    feed: Option<Arc<dyn CountsFeed>>,
    steps: u64,
    /// Simulated time at which the current direction got right of way
    green_since: f64,
    next_id: u64,
    spawned: u64,
}

impl SimWorld {
    pub fn new(config: SimConfig, events: EventSink) -> Self {
        let feed = config
            .counts_feed
            .clone()
            .map(|path| Arc::new(JsonlCountsFeed::new(path)) as Arc<dyn CountsFeed>);

        Self {
            lanes: LaneSet::new(),
            controller: SignalController::new(config.timing),
            emergency: EmergencyState::default(),
            monitor: PreemptionMonitor::new(),
            anomaly: AnomalyDetector::new(config.anomaly_threshold_secs),
            approaches: approaches(),
            rules: config.motion.rules(),
            assets: AssetCatalog::new(config.assets_dir.clone()),
            events,
            policy: Arc::new(WeightedQueuePolicy),
            feed,
            steps: 0,
            green_since: 0.0,
            next_id: 0,
            spawned: 0,
            config,
        }
    }

    /// World with default configuration whose events stay in memory
    pub fn detached() -> Self {
        Self::new(SimConfig::default(), EventSink::detached())
    }

    /// Replace the green-time algorithm
    pub fn with_policy(mut self, policy: Arc<dyn GreenTimePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Take queue counts from an external provider instead of the lanes
    pub fn with_feed(mut self, feed: Arc<dyn CountsFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Simulated seconds since the start
    pub fn time(&self) -> f64 {
        self.steps as f64 / self.config.motion.steps_per_second as f64
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn lanes(&self) -> &LaneSet {
        &self.lanes
    }

    pub fn lanes_mut(&mut self) -> &mut LaneSet {
        &mut self.lanes
    }

    pub fn controller(&self) -> &SignalController {
        &self.controller
    }

    pub fn emergency(&self) -> &EmergencyState {
        &self.emergency
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Stop forwarding events to the delivery worker
    pub fn close_events(&mut self) {
        self.events.close();
    }

    pub fn vehicles_spawned(&self) -> u64 {
        self.spawned
    }

    fn next_vehicle_id(&mut self) -> VehicleId {
        let id = VehicleId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Place a new vehicle at the tail of its lane
    pub fn spawn(&mut self, request: SpawnRequest) -> VehicleId {
        let SpawnRequest {
            category,
            direction,
            lane,
            will_turn,
        } = request;
        let now = self.time();
        let approach = self.approaches[direction.index()];
        let heading = approach.heading;
        let (length, _) = category.footprint();
        let gap = self.rules.stopping_gap;

        let mut position = approach.lane_origins[lane];
        let mut stop = approach.default_stop;
        if let Some(tail) = self.lanes.tail(direction, lane) {
            if !tail.crossed {
                stop = tail.stop - heading.sign * (tail.length + gap);
            }
            if !tail.has_turned() {
                let tail_back = tail.trailing(heading);
                let along = position.along_mut(heading.axis);
                *along = if heading.sign > 0.0 {
                    along.min(tail_back - gap - length)
                } else {
                    along.max(tail_back + gap)
                };
            }
        }

        let resolved = self.assets.resolve(direction, category);
        if let Some((requested, fallback)) = &resolved.missing {
            let fallback = match fallback {
                Sprite::Asset(path) => path.display().to_string(),
                Sprite::Placeholder => "placeholder".to_string(),
            };
            warn!(
                "Sprite {} missing; using {}",
                requested.display(),
                fallback
            );
            self.events.emit(
                EventKind::AssetMissing,
                now,
                json!({
                    "path": requested.display().to_string(),
                    "fallback": fallback,
                    "direction": direction,
                    "category": category,
                }),
            );
        }

        let id = self.next_vehicle_id();
        self.lanes.push(Vehicle::new(
            id,
            category,
            direction,
            lane,
            position,
            heading,
            will_turn,
            stop,
            resolved.sprite,
            now,
        ));
        self.spawned += 1;

        if category == VehicleCategory::Emergency {
            info!("Emergency vehicle spawned on the {} approach", direction);
            self.emergency.raise(direction);
            self.events.emit(
                EventKind::AmbulanceDetected,
                now,
                json!({ "direction": direction, "lane": lane }),
            );
            if let Some(change) = self.controller.apply_preemption(&self.emergency) {
                self.emit_phase_change(change, now);
            }
        }

        id
    }

    /// Advance the simulation by one motion step
    pub fn step(&mut self) -> MotionReport {
        self.steps += 1;
        let now = self.time();

        self.controller.poll_green_time();

        let phase = self.controller.snapshot();
        let report = advance_vehicles(&mut self.lanes, &self.approaches, &phase, &self.rules, now);

        if let Some(transition) = self.monitor.scan(&self.lanes, &mut self.emergency) {
            self.emit_emergency(transition, now);
        }
        if let Some(change) = self.controller.apply_preemption(&self.emergency) {
            self.emit_phase_change(change, now);
        }

        if self.steps % u64::from(self.config.motion.steps_per_second) == 0 {
            let outcome = self.controller.tick(&self.emergency);
            if let Some(change) = outcome.change {
                self.emit_phase_change(change, now);
            }
            if let Some(direction) = outcome.detection_due {
                if self.controller.current() != Some(direction) {
                    self.estimate_green(direction);
                }
            }
        }

        let phase = self.controller.snapshot();
        for anomaly in self.anomaly.scan(&mut self.lanes, &phase, self.green_since, now) {
            warn!(
                "Vehicle {:?} ({}) stalled for {:.1}s at the head of {} lane {}",
                anomaly.vehicle,
                anomaly.category,
                anomaly.stalled_seconds,
                anomaly.direction,
                anomaly.lane
            );
            self.events.emit(
                EventKind::AnomalyDetected,
                now,
                json!({
                    "direction": anomaly.direction,
                    "lane": anomaly.lane,
                    "category": anomaly.category,
                    "stalled_seconds": anomaly.stalled_seconds,
                }),
            );
        }

        report
    }

    /// Run whole simulated seconds
    pub fn run_seconds(&mut self, seconds: u64) {
        let steps = seconds * u64::from(self.config.motion.steps_per_second);
        for _ in 0..steps {
            self.step();
        }
    }

    /// Start the green-time estimate for the direction that is up next
    fn estimate_green(&mut self, direction: Direction) {
        let source = match &self.feed {
            Some(feed) => CountsSource::Feed {
                feed: Arc::clone(feed),
                current: self.controller.current(),
            },
            None => CountsSource::Local(QueueCounts::from_lanes(self.lanes.lanes_of(direction))),
        };
        let job = GreenTimeJob {
            direction,
            source,
            policy: Arc::clone(&self.policy),
            timing: *self.controller.timing(),
        };
        self.controller
            .begin_green_time(PendingGreenTime::dispatch(job));
    }

    fn emit_phase_change(&mut self, change: PhaseChange, now: f64) {
        self.green_since = now;
        info!(
            "Signal change: {} -> {} ({})",
            change.from.map_or("all-red", Direction::as_str),
            change.to,
            change.reason.as_str()
        );
        self.events.emit(
            EventKind::SignalChanged,
            now,
            json!({
                "from": change.from,
                "to": change.to,
                "reason": change.reason,
            }),
        );
    }

    fn emit_emergency(&mut self, transition: EmergencyTransition, now: f64) {
        match transition {
            EmergencyTransition::Detected(direction) => {
                info!("Emergency vehicle waiting on the {} approach", direction);
                self.events.emit(
                    EventKind::AmbulanceDetected,
                    now,
                    json!({ "direction": direction }),
                );
            }
            EmergencyTransition::Retargeted { from, to } => {
                info!("Emergency target moved from {} to {}", from, to);
                self.events.emit(
                    EventKind::AmbulanceDetected,
                    now,
                    json!({ "direction": to, "previous_direction": from }),
                );
            }
            EmergencyTransition::Cleared { previous } => {
                info!(
                    "Emergency cleared ({})",
                    previous.map_or("unknown", Direction::as_str)
                );
                self.events.emit(
                    EventKind::EmergencyCleared,
                    now,
                    json!({ "previous_direction": previous }),
                );
            }
        }
    }

    /// Apply a manual override command
    pub fn apply_command(&mut self, command: ControlCommand) -> SimResult<()> {
        let now = self.time();
        match command {
            ControlCommand::SetManualMode(enabled) => {
                let resumed = self.controller.set_manual_mode(enabled);
                let kind = if enabled {
                    EventKind::ManualModeActivated
                } else {
                    EventKind::ManualModeDeactivated
                };
                info!("Manual mode {}", if enabled { "on" } else { "off" });
                self.events.emit(kind, now, json!({}));
                if let Some(change) = resumed {
                    self.emit_phase_change(change, now);
                }
            }
            ControlCommand::SetSignal { signal, state } => {
                let direction = ControlCommand::direction_of(signal).ok_or_else(|| {
                    SimError::InvalidCommand(format!("signal {} does not exist", signal))
                })?;
                let handover = self.controller.manual_signal(direction, state)?;
                if state == Light::Green {
                    self.green_since = now;
                }
                info!("Manual override: signal {} ({}) -> {}", signal, direction, state);
                self.events.emit(
                    EventKind::ManualSignalChange,
                    now,
                    json!({
                        "signal": signal,
                        "state": state,
                        "direction": direction,
                    }),
                );
                if let Some(change) = handover {
                    self.emit_phase_change(change, now);
                }
            }
        }
        Ok(())
    }

    /// Print a summary of the intersection state
    pub fn print_summary(&self) {
        println!("=== Intersection Status ===");
        println!(
            "Time: {:.2}s  Mode: {}  Emergency: {}",
            self.time(),
            if self.controller.manual_mode() {
                "manual"
            } else {
                "automatic"
            },
            self.emergency
                .target()
                .map_or("none", Direction::as_str)
        );

        let phase = self.controller.snapshot();
        for direction in Direction::ALL {
            let signal = self.controller.signal(direction);
            let label = match phase.light(direction) {
                Light::Green => "GREEN ",
                Light::Yellow => "YELLOW",
                Light::Red => "RED   ",
            };
            println!(
                "  {} TS {} ({:5}) -> r: {:3} y: {:2} g: {:2}",
                label,
                direction.index() + 1,
                direction.as_str(),
                signal.red,
                signal.yellow,
                signal.green
            );
        }

        println!("--- Vehicles ---");
        for direction in Direction::ALL {
            println!(
                "  {:5}: {} on approach, {} crossed",
                direction.as_str(),
                self.lanes.count(direction),
                self.lanes.crossed(direction)
            );
        }
        println!(
            "  Total crossed: {} of {} spawned",
            self.lanes.total_crossed(),
            self.spawned
        );
    }
}

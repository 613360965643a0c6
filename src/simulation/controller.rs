//! Signal controller
//!
//! Drives the red -> green -> yellow -> red cycle for the four directions.
//! The controller is the only writer of the signal counters; emergency
//! preemption reaches it through the shared `EmergencyState` flags.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::emergency::EmergencyState;
use super::error::{SimError, SimResult};
use super::green_time::PendingGreenTime;
use super::signal::{SignalPhase, SignalTiming};
use super::types::{Direction, Light};

/// Green granted by a manual "green" command
pub const MANUAL_GREEN_SECS: u32 = 30;
/// Red imposed on the other directions by a manual "green" command
pub const MANUAL_CROSS_RED_SECS: u32 = 30;
/// Red imposed by a manual "red" command
pub const MANUAL_RED_SECS: u32 = 60;

/// Why the right of way moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    NormalCycle,
    EmergencyPreemption,
    ManualOverride,
}

impl ChangeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeReason::NormalCycle => "normal_cycle",
            ChangeReason::EmergencyPreemption => "emergency_preemption",
            ChangeReason::ManualOverride => "manual_override",
        }
    }
}

/// A completed phase transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    /// `None` when the intersection was all-red
    pub from: Option<Direction>,
    pub to: Direction,
    pub reason: ChangeReason,
}

/// Immutable view of who has right of way, taken once per motion step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSnapshot {
    pub current: Option<Direction>,
    pub yellow: bool,
}

impl PhaseSnapshot {
    /// Green and not yellow
    pub fn is_green(&self, direction: Direction) -> bool {
        self.current == Some(direction) && !self.yellow
    }

    pub fn light(&self, direction: Direction) -> Light {
        match self.current {
            Some(current) if current == direction && self.yellow => Light::Yellow,
            Some(current) if current == direction => Light::Green,
            _ => Light::Red,
        }
    }
}

/// Result of one signal tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub change: Option<PhaseChange>,
    /// Direction whose green should be estimated now
    pub detection_due: Option<Direction>,
}

#[derive(Debug)]
pub struct SignalController {
    signals: [SignalPhase; 4],
    current: Option<Direction>,
    next: Direction,
    yellow: bool,
    manual_mode: bool,
    timing: SignalTiming,
    pending: Option<PendingGreenTime>,
}

impl SignalController {
    /// North starts green; the red counters of the others are staggered so
    /// each turns green exactly when its predecessor's yellow ends
    pub fn new(timing: SignalTiming) -> Self {
        let slot = timing.default_yellow + timing.default_green;
        let signals = Direction::ALL.map(|direction| {
            SignalPhase::new(
                direction.index() as u32 * slot,
                timing.default_yellow,
                timing.default_green,
            )
        });

        Self {
            signals,
            current: Some(Direction::North),
            next: Direction::North.next(),
            yellow: false,
            manual_mode: false,
            timing,
            pending: None,
        }
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        PhaseSnapshot {
            current: self.current,
            yellow: self.yellow,
        }
    }

    pub fn signal(&self, direction: Direction) -> &SignalPhase {
        &self.signals[direction.index()]
    }

    pub fn signals(&self) -> &[SignalPhase; 4] {
        &self.signals
    }

    pub fn current(&self) -> Option<Direction> {
        self.current
    }

    pub fn next(&self) -> Direction {
        self.next
    }

    pub fn is_yellow(&self) -> bool {
        self.yellow
    }

    pub fn manual_mode(&self) -> bool {
        self.manual_mode
    }

    pub fn timing(&self) -> &SignalTiming {
        &self.timing
    }

    pub fn has_pending_estimate(&self) -> bool {
        self.pending.is_some()
    }

    /// Advance the signal clock by one second
    pub fn tick(&mut self, emergency: &EmergencyState) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        self.poll_green_time();

        if let Some(change) = self.apply_preemption(emergency) {
            outcome.change = Some(change);
            return outcome;
        }

        if self.manual_mode {
            return outcome;
        }

        let Some(current) = self.current else {
            return outcome;
        };

        for direction in Direction::ALL {
            let signal = &mut self.signals[direction.index()];
            if direction == current {
                if self.yellow {
                    signal.yellow = signal.yellow.saturating_sub(1);
                } else {
                    signal.green = signal.green.saturating_sub(1);
                    signal.total_green_time += 1;
                }
            } else {
                signal.red = signal.red.saturating_sub(1);
            }
        }

        if !self.yellow {
            if self.signals[self.next.index()].red == self.timing.detection_lead {
                outcome.detection_due = Some(self.next);
            }
            if self.signals[current.index()].green == 0 {
                if emergency.active || self.signals[current.index()].yellow == 0 {
                    outcome.change = Some(self.switch(emergency));
                } else {
                    self.yellow = true;
                }
            }
        } else if self.signals[current.index()].yellow == 0 {
            outcome.change = Some(self.switch(emergency));
        }

        outcome
    }

    /// Hard preemption: end the current green or yellow at once and hand the
    /// right of way to the emergency direction
    pub fn apply_preemption(&mut self, emergency: &EmergencyState) -> Option<PhaseChange> {
        let target = emergency.target()?;
        if self.current == Some(target) {
            return None;
        }

        let from = self.current;
        if let Some(preempted) = from {
            let signal = &mut self.signals[preempted.index()];
            signal.set(self.timing.default_red, self.timing.default_yellow, 0);
        }
        self.finish_pending();
        self.yellow = false;
        self.begin_green(target);

        info!(
            "Emergency preemption: {} -> {}",
            from.map_or("all-red", Direction::as_str),
            target
        );

        Some(PhaseChange {
            from,
            to: target,
            reason: ChangeReason::EmergencyPreemption,
        })
    }

    /// End of yellow (or of green when yellow is skipped)
    fn switch(&mut self, emergency: &EmergencyState) -> PhaseChange {
        let from = self.current;
        self.finish_pending();

        if let Some(ending) = from {
            self.signals[ending.index()].reset(&self.timing);
        }
        self.yellow = false;

        let (to, reason) = match emergency.target() {
            Some(direction) => (direction, ChangeReason::EmergencyPreemption),
            None => (self.next, ChangeReason::NormalCycle),
        };
        self.begin_green(to);

        PhaseChange { from, to, reason }
    }

    fn begin_green(&mut self, direction: Direction) {
        let signal = &mut self.signals[direction.index()];
        if signal.green == 0 {
            signal.green = self.timing.minimum;
        }
        let pipeline = signal.yellow + signal.green;

        self.current = Some(direction);
        self.next = direction.next();
        self.signals[self.next.index()].red = pipeline;
    }

    /// Hand over an estimate started by the caller
    pub fn begin_green_time(&mut self, pending: PendingGreenTime) {
        if let Some(previous) = &self.pending {
            debug!(
                "Dropping unfinished green-time estimate for {}",
                previous.direction
            );
        }
        self.pending = Some(pending);
    }

    /// Apply a finished estimate, if any
    pub fn poll_green_time(&mut self) {
        let finished = match &mut self.pending {
            Some(pending) => pending.poll().map(|result| (pending.direction, result)),
            None => None,
        };
        if let Some((direction, result)) = finished {
            self.pending = None;
            self.apply_green_result(direction, result);
        }
    }

    /// Last chance for an estimate before a switch; late results are dropped
    fn finish_pending(&mut self) {
        self.poll_green_time();
        if let Some(pending) = self.pending.take() {
            warn!(
                "Green-time estimate for {} not ready at switch; keeping {}s",
                pending.direction,
                self.signals[pending.direction.index()].green
            );
        }
    }

    fn apply_green_result(&mut self, direction: Direction, result: SimResult<u32>) {
        let signal = &mut self.signals[direction.index()];
        match result {
            Ok(green) if self.timing.in_bounds(green) => {
                debug!("Green time for {}: {}s", direction, green);
                signal.green = green;
            }
            Ok(green) => warn!(
                "Ignoring green time {}s for {} outside [{}, {}]; keeping {}s",
                green, direction, self.timing.minimum, self.timing.maximum, signal.green
            ),
            Err(e) => warn!(
                "Green-time estimate for {} failed ({}); keeping {}s",
                direction, e, signal.green
            ),
        }
    }

    /// Enter or leave manual mode. Leaving it while all-red resumes the cycle.
    pub fn set_manual_mode(&mut self, enabled: bool) -> Option<PhaseChange> {
        self.manual_mode = enabled;
        if enabled || self.current.is_some() {
            return None;
        }

        let to = self.next;
        self.begin_green(to);
        Some(PhaseChange {
            from: None,
            to,
            reason: ChangeReason::NormalCycle,
        })
    }

    /// Force one direction into a given state; only valid in manual mode.
    /// Returns the handover when the right of way moved to another direction.
    pub fn manual_signal(
        &mut self,
        direction: Direction,
        state: Light,
    ) -> SimResult<Option<PhaseChange>> {
        if !self.manual_mode {
            return Err(SimError::InvalidCommand(
                "manual mode is not active".into(),
            ));
        }

        let from = self.current;
        match state {
            Light::Green => {
                self.current = Some(direction);
                self.yellow = false;
                self.next = direction.next();
                for other in Direction::ALL {
                    let signal = &mut self.signals[other.index()];
                    if other == direction {
                        signal.set(0, 0, MANUAL_GREEN_SECS);
                    } else {
                        signal.set(MANUAL_CROSS_RED_SECS, 0, 0);
                    }
                }
            }
            Light::Yellow => {
                if self.current == Some(direction) {
                    self.yellow = true;
                    self.signals[direction.index()].set(0, self.timing.default_yellow, 0);
                }
            }
            Light::Red => {
                self.signals[direction.index()].set(MANUAL_RED_SECS, 0, 0);
                if self.current == Some(direction) {
                    self.yellow = false;
                    self.current = Direction::ALL
                        .into_iter()
                        .find(|d| self.signals[d.index()].green > 0);
                    self.next = self.current.unwrap_or(direction).next();
                }
            }
        }

        Ok(match self.current {
            Some(to) if from != Some(to) => Some(PhaseChange {
                from,
                to,
                reason: ChangeReason::ManualOverride,
            }),
            _ => None,
        })
    }
}

//! Signal controller validation tests
//!
//! Drives the controller tick by tick without any vehicles to check the
//! phase cycle, detection timing, preemption and manual overrides.

use std::sync::Arc;

use traffic_signal_sim::simulation::{
    ChangeReason, CountsSource, Direction, EmergencyState, GreenTimeJob, GreenTimePolicy, Light,
    PendingGreenTime, QueueCounts, SignalController, SignalTiming, SimError, SimResult,
    VehicleCategory, WeightedQueuePolicy, MANUAL_CROSS_RED_SECS, MANUAL_GREEN_SECS,
};

struct FixedPolicy(SimResult<u32>);

impl GreenTimePolicy for FixedPolicy {
    fn green_time(&self, _counts: &QueueCounts, _timing: &SignalTiming) -> SimResult<u32> {
        match &self.0 {
            Ok(green) => Ok(*green),
            Err(e) => Err(SimError::Policy(e.to_string())),
        }
    }
}

fn estimate(
    direction: Direction,
    counts: QueueCounts,
    policy: Arc<dyn GreenTimePolicy>,
) -> PendingGreenTime {
    PendingGreenTime::dispatch(GreenTimeJob {
        direction,
        source: CountsSource::Local(counts),
        policy,
        timing: SignalTiming::default(),
    })
}

fn tick_n(controller: &mut SignalController, emergency: &EmergencyState, n: usize) {
    for _ in 0..n {
        controller.tick(emergency);
    }
}

#[test]
fn test_initial_phase() {
    let controller = SignalController::new(SignalTiming::default());

    assert_eq!(controller.current(), Some(Direction::North));
    assert_eq!(controller.next(), Direction::East);
    assert!(!controller.is_yellow());

    let reds: Vec<u32> = Direction::ALL
        .iter()
        .map(|d| controller.signal(*d).red)
        .collect();
    assert_eq!(reds, vec![0, 25, 50, 75]);
}

#[test]
fn test_normal_cycle_with_detection_lead() {
    let mut controller = SignalController::new(SignalTiming::default());
    let emergency = EmergencyState::default();

    for second in 1..20 {
        let outcome = controller.tick(&emergency);
        assert_eq!(outcome.detection_due, None, "second {}", second);
        assert_eq!(outcome.change, None, "second {}", second);
    }

    // Green runs out exactly when East is five seconds from its green
    let outcome = controller.tick(&emergency);
    assert_eq!(outcome.detection_due, Some(Direction::East));
    assert_eq!(outcome.change, None);
    assert!(controller.is_yellow());
    assert_eq!(controller.snapshot().light(Direction::North), Light::Yellow);

    tick_n(&mut controller, &emergency, 4);
    assert_eq!(controller.current(), Some(Direction::North));

    let outcome = controller.tick(&emergency);
    let change = outcome.change.expect("yellow expiry switches the phase");
    assert_eq!(change.from, Some(Direction::North));
    assert_eq!(change.to, Direction::East);
    assert_eq!(change.reason, ChangeReason::NormalCycle);

    // The ending direction is back to its defaults
    let north = controller.signal(Direction::North);
    assert_eq!((north.red, north.yellow, north.green), (150, 5, 20));
    assert_eq!(north.total_green_time, 20);

    // Next in line waits for East's yellow plus green
    assert_eq!(controller.next(), Direction::South);
    assert_eq!(controller.signal(Direction::South).red, 25);
}

#[test]
fn test_estimate_sets_next_green() {
    let mut controller = SignalController::new(SignalTiming::default());
    let emergency = EmergencyState::default();

    tick_n(&mut controller, &emergency, 20);
    let counts = QueueCounts::new().with(VehicleCategory::Car, 45);
    controller.begin_green_time(estimate(
        Direction::East,
        counts,
        Arc::new(WeightedQueuePolicy),
    ));

    tick_n(&mut controller, &emergency, 5);
    assert_eq!(controller.current(), Some(Direction::East));
    assert_eq!(controller.signal(Direction::East).green, 30);
    assert_eq!(controller.signal(Direction::South).red, 35);
}

#[test]
fn test_invalid_estimates_are_ignored() {
    let emergency = EmergencyState::default();

    for policy in [FixedPolicy(Ok(500)), FixedPolicy(Ok(3)), FixedPolicy(Err(SimError::Policy("boom".into())))] {
        let mut controller = SignalController::new(SignalTiming::default());
        tick_n(&mut controller, &emergency, 20);
        controller.begin_green_time(estimate(Direction::East, QueueCounts::new(), Arc::new(policy)));

        tick_n(&mut controller, &emergency, 5);
        assert_eq!(controller.current(), Some(Direction::East));
        assert_eq!(controller.signal(Direction::East).green, 20);
        assert!(!controller.has_pending_estimate());
    }
}

#[test]
fn test_emergency_preemption_is_immediate() {
    let mut controller = SignalController::new(SignalTiming::default());
    let mut emergency = EmergencyState::default();

    tick_n(&mut controller, &emergency, 3);
    emergency.raise(Direction::South);

    let outcome = controller.tick(&emergency);
    let change = outcome.change.expect("preemption switches the phase");
    assert_eq!(change.from, Some(Direction::North));
    assert_eq!(change.to, Direction::South);
    assert_eq!(change.reason, ChangeReason::EmergencyPreemption);

    assert_eq!(controller.current(), Some(Direction::South));
    assert!(!controller.is_yellow());
    assert_eq!(controller.signal(Direction::North).green, 0);
    assert_eq!(controller.next(), Direction::West);

    // No double preemption while the emergency direction holds green
    let outcome = controller.tick(&emergency);
    assert_eq!(outcome.change, None);
    assert_eq!(controller.current(), Some(Direction::South));
}

#[test]
fn test_preemption_cancels_yellow() {
    let mut controller = SignalController::new(SignalTiming::default());
    let mut emergency = EmergencyState::default();

    tick_n(&mut controller, &emergency, 21);
    assert!(controller.is_yellow());

    emergency.raise(Direction::West);
    let change = controller
        .apply_preemption(&emergency)
        .expect("yellow is cut short");
    assert_eq!(change.to, Direction::West);
    assert!(!controller.is_yellow());
    assert_eq!(controller.snapshot().light(Direction::North), Light::Red);
    assert_eq!(controller.snapshot().light(Direction::West), Light::Green);
}

#[test]
fn test_emergency_skips_yellow() {
    let mut controller = SignalController::new(SignalTiming::default());
    let mut emergency = EmergencyState::default();
    emergency.raise(Direction::North);

    tick_n(&mut controller, &emergency, 20);
    assert!(!controller.is_yellow());
    assert_eq!(controller.current(), Some(Direction::North));
}

#[test]
fn test_manual_mode_freezes_countdown() {
    let mut controller = SignalController::new(SignalTiming::default());
    let emergency = EmergencyState::default();

    assert_eq!(controller.set_manual_mode(true), None);
    let before = *controller.signals();
    tick_n(&mut controller, &emergency, 10);
    assert_eq!(*controller.signals(), before);
}

#[test]
fn test_manual_signal_requires_manual_mode() {
    let mut controller = SignalController::new(SignalTiming::default());
    let result = controller.manual_signal(Direction::East, Light::Green);
    assert!(matches!(result, Err(SimError::InvalidCommand(_))));
    assert_eq!(controller.current(), Some(Direction::North));
}

#[test]
fn test_manual_green_then_release() {
    let mut controller = SignalController::new(SignalTiming::default());
    let emergency = EmergencyState::default();

    controller.set_manual_mode(true);
    controller
        .manual_signal(Direction::West, Light::Green)
        .expect("manual mode is active");

    assert_eq!(controller.current(), Some(Direction::West));
    for direction in Direction::ALL {
        let signal = controller.signal(direction);
        if direction == Direction::West {
            assert_eq!(signal.green, MANUAL_GREEN_SECS);
        } else {
            assert_eq!((signal.red, signal.green), (MANUAL_CROSS_RED_SECS, 0));
        }
    }

    assert_eq!(controller.set_manual_mode(false), None);
    controller.tick(&emergency);
    assert_eq!(controller.signal(Direction::West).green, MANUAL_GREEN_SECS - 1);
}

#[test]
fn test_manual_red_all_red_then_resume() {
    let mut controller = SignalController::new(SignalTiming::default());

    controller.set_manual_mode(true);
    controller
        .manual_signal(Direction::West, Light::Green)
        .expect("manual mode is active");
    controller
        .manual_signal(Direction::West, Light::Red)
        .expect("manual mode is active");

    assert_eq!(controller.current(), None);
    assert_eq!(controller.signal(Direction::West).red, 60);

    let change = controller
        .set_manual_mode(false)
        .expect("leaving manual mode while all-red resumes the cycle");
    assert_eq!(change.from, None);
    assert_eq!(change.to, Direction::North);
    assert_eq!(change.reason, ChangeReason::NormalCycle);
    assert_eq!(controller.signal(Direction::North).green, 10);
}

#[test]
fn test_manual_yellow_only_for_current() {
    let mut controller = SignalController::new(SignalTiming::default());
    controller.set_manual_mode(true);

    controller
        .manual_signal(Direction::South, Light::Yellow)
        .expect("manual mode is active");
    assert!(!controller.is_yellow());

    controller
        .manual_signal(Direction::North, Light::Yellow)
        .expect("manual mode is active");
    assert!(controller.is_yellow());
    assert_eq!(controller.signal(Direction::North).yellow, 5);
}

#[test]
fn test_at_most_one_direction_has_right_of_way() {
    let mut controller = SignalController::new(SignalTiming::default());
    let mut emergency = EmergencyState::default();

    for second in 0..400 {
        if second == 130 {
            emergency.raise(Direction::West);
        }
        if second == 160 {
            emergency.clear();
        }
        controller.tick(&emergency);

        let snapshot = controller.snapshot();
        let lit = Direction::ALL
            .iter()
            .filter(|d| snapshot.light(**d) != Light::Red)
            .count();
        assert!(lit <= 1, "{} directions lit at second {}", lit, second);
    }
}

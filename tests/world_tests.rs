//! Whole-engine tests
//!
//! Builds worlds without an async runtime so every green-time estimate runs
//! inline and the results are deterministic.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use traffic_signal_sim::simulation::{
    replay_cycle, ControlCommand, CountsFeed, Direction, EventKind, EventSink, GreenTimePolicy,
    Light, QueueCounts, QueueRecord, SignalTiming, SimConfig, SimResult, SimWorld, SpawnRequest,
    Sprite, TrafficConfig, TrafficGenerator, VehicleCategory, VehicleId, BIKE_LANE, TURN_LANE,
};

fn give_west_green(world: &mut SimWorld) {
    for line in ["manual on", "signal 4 green", "manual off"] {
        let command: ControlCommand = line.parse().expect("valid command");
        world.apply_command(command).expect("command applies");
    }
    assert_eq!(world.controller().current(), Some(Direction::West));
}

#[test]
fn test_emergency_spawn_preempts_current_green() {
    let mut world = SimWorld::detached();
    give_west_green(&mut world);

    world.spawn(SpawnRequest::new(
        VehicleCategory::Emergency,
        Direction::East,
        1,
    ));
    world.step();

    assert!(world.emergency().active);
    assert_eq!(world.emergency().direction, Some(Direction::East));
    assert_eq!(world.controller().signal(Direction::West).green, 0);
    assert_eq!(world.controller().current(), Some(Direction::East));

    assert_eq!(world.events().count(EventKind::AmbulanceDetected), 1);
    let change = world
        .events()
        .of_kind(EventKind::SignalChanged)
        .last()
        .expect("preemption is reported");
    assert_eq!(change.field_str("from"), Some("west"));
    assert_eq!(change.field_str("to"), Some("east"));
    assert_eq!(change.field_str("reason"), Some("emergency_preemption"));
}

#[test]
fn test_emergency_clears_after_crossing() {
    let mut world = SimWorld::detached();
    world.spawn(SpawnRequest::new(
        VehicleCategory::Emergency,
        Direction::North,
        1,
    ));
    assert!(world.emergency().active);

    world.run_seconds(3);

    assert!(!world.emergency().active);
    assert_eq!(world.events().count(EventKind::AmbulanceDetected), 1);
    let cleared = world
        .events()
        .of_kind(EventKind::EmergencyCleared)
        .collect::<Vec<_>>();
    assert_eq!(cleared.len(), 1);
    assert_eq!(cleared[0].field_str("previous_direction"), Some("north"));
}

#[test]
fn test_stalled_leader_reported_once() {
    let mut config = SimConfig::default();
    config.timing.default_green = 40;
    let mut world = SimWorld::new(config, EventSink::detached());

    world.spawn(SpawnRequest::new(VehicleCategory::Car, Direction::North, 1));
    world
        .lanes_mut()
        .lane_mut(Direction::North, 1)
        .first_mut()
        .expect("vehicle spawned")
        .speed = 0.0;

    world.run_seconds(19);
    assert_eq!(world.events().count(EventKind::AnomalyDetected), 0);

    world.run_seconds(21);
    let anomalies = world
        .events()
        .of_kind(EventKind::AnomalyDetected)
        .collect::<Vec<_>>();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].field_str("direction"), Some("north"));
    assert_eq!(anomalies[0].field_str("category"), Some("car"));
    assert_eq!(anomalies[0].payload.get("lane"), Some(&json!(1)));
}

#[test]
fn test_no_anomaly_on_red() {
    let mut world = SimWorld::detached();
    world.spawn(SpawnRequest::new(VehicleCategory::Car, Direction::South, 1));

    // South waits on red for the whole run
    world.run_seconds(45);
    assert_eq!(world.events().count(EventKind::AnomalyDetected), 0);
}

#[test]
fn test_lane_order_is_preserved() {
    let mut world = SimWorld::detached();
    let mut spawned = Vec::new();
    for category in [
        VehicleCategory::Bus,
        VehicleCategory::Car,
        VehicleCategory::Rickshaw,
        VehicleCategory::Truck,
    ] {
        spawned.push(world.spawn(SpawnRequest::new(category, Direction::North, 1)));
    }
    world.spawn(SpawnRequest::new(VehicleCategory::Car, Direction::North, 2));

    let mut crossed: Vec<VehicleId> = Vec::new();
    for _ in 0..600 {
        let report = world.step();
        crossed.extend(
            report
                .crossed
                .iter()
                .filter(|(direction, lane, _)| *direction == Direction::North && *lane == 1)
                .map(|(_, _, id)| *id),
        );
    }

    assert_eq!(crossed, spawned);
    assert_eq!(world.lanes().crossed(Direction::North), 5);
}

#[test]
fn test_spawn_queues_behind_tail() {
    let mut world = SimWorld::detached();
    world.spawn(SpawnRequest::new(VehicleCategory::Car, Direction::North, 1));
    world.spawn(SpawnRequest::new(VehicleCategory::Car, Direction::North, 1));

    let lane = world.lanes().lane(Direction::North, 1);
    assert_eq!(lane[0].position.y, 0.0);
    assert_eq!(lane[0].stop, 320.0);
    // Car length 44 plus the stopping gap of 15
    assert_eq!(lane[1].position.y, -59.0);
    assert_eq!(lane[1].stop, 261.0);
}

#[test]
fn test_queue_holds_at_red() {
    let mut world = SimWorld::detached();
    world.spawn(SpawnRequest::new(VehicleCategory::Car, Direction::West, 1));
    world.spawn(SpawnRequest::new(VehicleCategory::Car, Direction::West, 1));

    world.run_seconds(10);

    let lane = world.lanes().lane(Direction::West, 1);
    assert!(lane.iter().all(|v| !v.crossed));
    assert!(lane[0].leading_edge() <= 580.0 + lane[0].speed);
    assert!(lane[1].leading_edge() < lane[0].trailing(lane[0].heading));
    assert_eq!(world.lanes().crossed(Direction::West), 0);
}

#[test]
fn test_turning_vehicle_leaves_on_new_heading() {
    let mut world = SimWorld::detached();
    world.spawn(SpawnRequest::new(VehicleCategory::Car, Direction::North, TURN_LANE).turning());

    world.run_seconds(4);

    let lane = world.lanes().lane(Direction::North, TURN_LANE);
    match lane.first() {
        Some(vehicle) => {
            assert!(vehicle.crossed);
            assert!(vehicle.has_turned());
        }
        None => assert_eq!(world.lanes().crossed(Direction::North), 1),
    }
}

#[test]
fn test_signal_changes_replay_to_cycle() {
    let mut world = SimWorld::detached();
    let mut observed = vec![Direction::North];

    for _ in 0..(150 * 60) {
        world.step();
        if let Some(current) = world.controller().current() {
            if observed.last() != Some(&current) {
                observed.push(current);
            }
        }
    }

    assert_eq!(
        &observed[..5],
        &[
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
            Direction::North,
        ]
    );
    assert_eq!(replay_cycle(world.events().journal()), observed);
}

#[test]
fn test_manual_commands_emit_events() {
    let mut world = SimWorld::detached();

    let refused = world.apply_command("signal 2 green".parse().expect("valid command"));
    assert!(refused.is_err());
    assert_eq!(world.events().count(EventKind::ManualSignalChange), 0);

    world
        .apply_command(ControlCommand::SetManualMode(true))
        .expect("command applies");
    world
        .apply_command(ControlCommand::SetSignal {
            signal: 2,
            state: Light::Green,
        })
        .expect("command applies");

    assert_eq!(world.controller().current(), Some(Direction::East));
    assert_eq!(world.events().count(EventKind::ManualModeActivated), 1);
    let change = world
        .events()
        .of_kind(EventKind::ManualSignalChange)
        .next()
        .expect("manual change is reported");
    assert_eq!(change.field_str("direction"), Some("east"));
    assert_eq!(change.field_str("state"), Some("green"));

    // Frozen while manual
    world.run_seconds(5);
    assert_eq!(world.controller().signal(Direction::East).green, 30);

    world
        .apply_command(ControlCommand::SetManualMode(false))
        .expect("command applies");
    assert_eq!(world.events().count(EventKind::ManualModeDeactivated), 1);
    world.run_seconds(5);
    assert_eq!(world.controller().signal(Direction::East).green, 25);
}

#[test]
fn test_manual_red_on_current_hands_over_in_cycle() {
    let mut world = SimWorld::detached();
    for line in ["manual on", "signal 1 red", "manual off"] {
        let command: ControlCommand = line.parse().expect("valid command");
        world.apply_command(command).expect("command applies");
    }

    assert_eq!(world.controller().current(), Some(Direction::East));
    assert_eq!(world.controller().next(), Direction::South);
    let handover = world
        .events()
        .of_kind(EventKind::SignalChanged)
        .last()
        .expect("handover is reported");
    assert_eq!(handover.field_str("from"), Some("north"));
    assert_eq!(handover.field_str("to"), Some("east"));
    assert_eq!(handover.field_str("reason"), Some("manual_override"));

    let mut observed = vec![Direction::North, Direction::East];
    for _ in 0..(60 * 60) {
        world.step();
        if let Some(current) = world.controller().current() {
            if observed.last() != Some(&current) {
                observed.push(current);
            }
        }
    }

    assert_eq!(
        &observed[..3],
        &[Direction::North, Direction::East, Direction::South]
    );
    assert_eq!(replay_cycle(world.events().journal()), observed);
}

#[test]
fn test_control_command_parsing() {
    assert_eq!(
        "manual on".parse::<ControlCommand>().expect("valid"),
        ControlCommand::SetManualMode(true)
    );
    assert_eq!(
        "  MANUAL   off ".parse::<ControlCommand>().expect("valid"),
        ControlCommand::SetManualMode(false)
    );
    assert_eq!(
        "signal 3 yellow".parse::<ControlCommand>().expect("valid"),
        ControlCommand::SetSignal {
            signal: 3,
            state: Light::Yellow
        }
    );
    assert!("signal 5 green".parse::<ControlCommand>().is_err());
    assert!("signal 0 green".parse::<ControlCommand>().is_err());
    assert!("signal 1 blue".parse::<ControlCommand>().is_err());
    assert!("reboot".parse::<ControlCommand>().is_err());
}

struct FixedPolicy(u32);

impl GreenTimePolicy for FixedPolicy {
    fn green_time(&self, _counts: &QueueCounts, _timing: &SignalTiming) -> SimResult<u32> {
        Ok(self.0)
    }
}

#[test]
fn test_injected_policy_sets_green() {
    let mut world = SimWorld::detached().with_policy(Arc::new(FixedPolicy(42)));
    world.run_seconds(25);

    assert_eq!(world.controller().current(), Some(Direction::East));
    assert_eq!(world.controller().signal(Direction::East).green, 42);
}

#[test]
fn test_external_feed_replaces_lane_counts() {
    let feed = |_current: Option<Direction>, _next: Direction| -> SimResult<QueueRecord> {
        Ok(serde_json::from_value(json!({
            "counts": { "east": { "1": { "car": 30 }, "2": { "car": 15 } } }
        }))?)
    };
    let mut world = SimWorld::detached().with_feed(Arc::new(feed) as Arc<dyn CountsFeed>);
    world.run_seconds(25);

    assert_eq!(world.controller().current(), Some(Direction::East));
    assert_eq!(world.controller().signal(Direction::East).green, 30);
}

fn asset_dir(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("{}_{}", std::process::id(), name));
    let north = root.join("north");
    std::fs::create_dir_all(&north).expect("create asset dir");
    std::fs::write(north.join("car.png"), b"png").expect("write sprite");
    root
}

#[test]
fn test_missing_sprite_falls_back() {
    let root = asset_dir("assets_fallback");
    let config = SimConfig {
        assets_dir: Some(root.clone()),
        ..SimConfig::default()
    };
    let mut world = SimWorld::new(config, EventSink::detached());

    world.spawn(SpawnRequest::new(VehicleCategory::Car, Direction::North, 1));
    assert_eq!(world.events().count(EventKind::AssetMissing), 0);

    world.spawn(SpawnRequest::new(VehicleCategory::Bus, Direction::North, 2));
    let bus = &world.lanes().lane(Direction::North, 2)[0];
    assert_eq!(bus.sprite, Sprite::Asset(root.join("north").join("car.png")));
    let missing = world
        .events()
        .of_kind(EventKind::AssetMissing)
        .next()
        .expect("missing sprite is reported");
    assert!(missing
        .field_str("path")
        .is_some_and(|path| path.ends_with("bus.png")));

    world.spawn(SpawnRequest::new(VehicleCategory::Truck, Direction::East, 1));
    assert_eq!(
        world.lanes().lane(Direction::East, 1)[0].sprite,
        Sprite::Placeholder
    );
    assert_eq!(world.events().count(EventKind::AssetMissing), 2);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_generator_is_reproducible_with_seed() {
    let mut first = TrafficGenerator::new_with_seed(TrafficConfig::default(), 11);
    let mut second = TrafficGenerator::new_with_seed(TrafficConfig::default(), 11);

    for _ in 0..200 {
        let request = first.draw();
        assert_eq!(request, second.draw());

        if request.category == VehicleCategory::Bike {
            assert_eq!(request.lane, BIKE_LANE);
        } else {
            assert!(request.lane == 1 || request.lane == 2);
        }
        if request.will_turn {
            assert_eq!(request.lane, TURN_LANE);
        }
    }
}

#[test]
fn test_generator_follows_weights() {
    let mut config = TrafficConfig::default();
    config.direction_weights.north = 0;
    config.direction_weights.south = 0;
    config.direction_weights.west = 0;
    config.emergency_probability = 1.0;

    let mut generator = TrafficGenerator::new_with_seed(config, 3);
    for _ in 0..50 {
        let request = generator.draw();
        assert_eq!(request.direction, Direction::East);
        assert_eq!(request.category, VehicleCategory::Emergency);
    }
}

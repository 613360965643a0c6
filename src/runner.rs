//! Real-time driver for the simulation
//!
//! Runs the tick loop against the wall clock (scaled by `time_scale`) while
//! the traffic generator, the event delivery worker and the optional control
//! input run as separate tasks feeding it through channels.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::simulation::{
    run_delivery_with_cutoff, ControlCommand, DeliveryStats, Direction, EventSink, HttpEndpoint, SimConfig,
    SimWorld, SpillLog, TrafficGenerator,
};

/// Wall-clock period of one loop iteration
const FRAME: Duration = Duration::from_millis(10);

/// How long the delivery worker may keep trying the collector after the run
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shortest wall-clock gap between generated vehicles
const MIN_SPAWN_PERIOD: Duration = Duration::from_micros(100);

#[derive(Debug, Default)]
pub struct RunOptions {
    /// Manual override commands fed into the running simulation
    pub control: Option<mpsc::Receiver<ControlCommand>>,
    /// Print the status summary every this many simulated seconds
    pub summary_every: Option<u64>,
}

/// Statistics of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub sim_seconds: f64,
    pub vehicles_spawned: u64,
    /// Crossed vehicles indexed by `Direction::index`
    pub crossed: [u32; 4],
    pub total_crossed: u32,
    /// Seconds of green indexed by `Direction::index`
    pub green_time: [u32; 4],
    pub events_emitted: usize,
    pub delivery: DeliveryStats,
}

impl RunReport {
    fn from_world(world: &SimWorld, delivery: DeliveryStats) -> Self {
        Self {
            sim_seconds: world.time(),
            vehicles_spawned: world.vehicles_spawned(),
            crossed: Direction::ALL.map(|d| world.lanes().crossed(d)),
            total_crossed: world.lanes().total_crossed(),
            green_time: Direction::ALL.map(|d| world.controller().signal(d).total_green_time),
            events_emitted: world.events().emitted(),
            delivery,
        }
    }

    pub fn throughput(&self) -> f64 {
        if self.sim_seconds > 0.0 {
            self.total_crossed as f64 / self.sim_seconds
        } else {
            0.0
        }
    }

    pub fn log(&self) {
        for direction in Direction::ALL {
            info!(
                "Direction {} ({}): {} vehicles crossed",
                direction.index() + 1,
                direction,
                self.crossed[direction.index()]
            );
        }
        info!("Total vehicles spawned: {}", self.vehicles_spawned);
        info!("Total vehicles passed: {}", self.total_crossed);
        info!("Total time passed: {:.1}s", self.sim_seconds);
        info!("Vehicles passed per second: {:.3}", self.throughput());
        for direction in Direction::ALL {
            info!(
                "Green time for {}: {}s",
                direction,
                self.green_time[direction.index()]
            );
        }
        info!(
            "Events: {} emitted, {} delivered, {} spilled, {} lost",
            self.events_emitted, self.delivery.delivered, self.delivery.spilled, self.delivery.lost
        );
        info!("=== SIMULATION COMPLETE ===");
    }
}

/// Read control commands from stdin, one per line
pub fn spawn_stdin_control() -> mpsc::Receiver<ControlCommand> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Could not read control input: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ControlCommand>() {
                Ok(command) => {
                    if tx.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{}", e),
            }
        }
        debug!("Control input closed");
    });
    rx
}

/// Run the simulation until its configured duration elapses or Ctrl-C
pub async fn run(config: SimConfig, options: RunOptions) -> Result<RunReport> {
    config.validate().context("Invalid simulation configuration")?;

    let RunOptions {
        mut control,
        summary_every,
    } = options;

    let endpoint = match &config.events.endpoint {
        Some(url) => Some(
            HttpEndpoint::new(url.clone(), config.events.timeout())
                .context("Failed to build the event collector client")?,
        ),
        None => None,
    };
    let spill = SpillLog::new(config.events.spill_path.clone());
    info!(
        "Events go to {} (spill file {})",
        endpoint.as_ref().map_or("no collector", HttpEndpoint::url),
        spill.path().display()
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cutoff, spill_only) = watch::channel(false);
    let mut delivery = tokio::spawn(run_delivery_with_cutoff(
        event_rx, endpoint, spill, spill_only,
    ));

    let generator = match config.seed {
        Some(seed) => TrafficGenerator::new_with_seed(config.traffic, seed),
        None => TrafficGenerator::new(config.traffic),
    };
    let spawn_period =
        Duration::try_from_secs_f64(config.traffic.spawn_interval_secs / config.time_scale)
            .context("Spawn interval does not fit the time scale")?
            .max(MIN_SPAWN_PERIOD);
    let (spawn_tx, mut spawn_rx) = mpsc::channel(64);
    let generator_task = tokio::spawn(generator.run(spawn_tx, spawn_period));

    let steps_per_second = u64::from(config.motion.steps_per_second);
    let step_limit = (config.duration_secs > 0).then(|| config.duration_secs * steps_per_second);
    let summary_steps = summary_every
        .filter(|secs| *secs > 0)
        .map(|secs| secs * steps_per_second);
    let steps_per_wall_second = config.time_scale * steps_per_second as f64;

    info!(
        "Starting simulation: {} simulated seconds at {}x",
        if config.duration_secs > 0 {
            config.duration_secs.to_string()
        } else {
            "unlimited".to_string()
        },
        config.time_scale
    );

    let mut world = SimWorld::new(config, EventSink::with_delivery(event_tx));

    let started = Instant::now();
    let mut frame = tokio::time::interval(FRAME);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = frame.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted; stopping the simulation");
                break;
            }
        }

        while let Ok(request) = spawn_rx.try_recv() {
            world.spawn(request);
        }
        if let Some(commands) = control.as_mut() {
            while let Ok(command) = commands.try_recv() {
                if let Err(e) = world.apply_command(command) {
                    warn!("Ignoring {:?}: {}", command, e);
                }
            }
        }

        let due = (started.elapsed().as_secs_f64() * steps_per_wall_second) as u64;
        let due = step_limit.map_or(due, |limit| due.min(limit));
        while world.steps() < due {
            world.step();
            if summary_steps.is_some_and(|every| world.steps() % every == 0) {
                world.print_summary();
            }
        }

        if step_limit.is_some_and(|limit| world.steps() >= limit) {
            break;
        }
    }

    generator_task.abort();
    drop(spawn_rx);
    world.close_events();

    let joined = match tokio::time::timeout(DRAIN_TIMEOUT, &mut delivery).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!(
                "Event collector did not drain within {:?}; spilling the rest",
                DRAIN_TIMEOUT
            );
            if cutoff.send(true).is_err() {
                debug!("Delivery worker already gone");
            }
            delivery.await
        }
    };
    let delivery = joined.unwrap_or_else(|e| {
        warn!("Event delivery worker failed: {}", e);
        DeliveryStats::default()
    });

    let report = RunReport::from_world(&world, delivery);
    report.log();
    Ok(report)
}

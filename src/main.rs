use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use traffic_signal_sim::runner::{self, RunOptions};
use traffic_signal_sim::simulation::SimConfig;

const DEFAULT_LOG_FILTER: &str = "warn,traffic_signal_sim=info,events=info";

#[derive(Parser)]
#[command(name = "traffic_signal_sim")]
#[command(about = "Headless adaptive traffic-signal intersection simulation")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulated seconds to run (0 runs until Ctrl-C)
    #[arg(long)]
    duration: Option<u64>,

    /// Simulated seconds per wall-clock second
    #[arg(long)]
    time_scale: Option<f64>,

    /// Seed for reproducible traffic
    #[arg(long)]
    seed: Option<u64>,

    /// HTTP endpoint receiving one JSON event per POST
    #[arg(long)]
    events_url: Option<String>,

    /// File collecting events that could not be delivered
    #[arg(long)]
    spill_path: Option<PathBuf>,

    /// JSON-lines file with externally detected queue counts
    #[arg(long)]
    counts_feed: Option<PathBuf>,

    /// Directory holding <direction>/<category>.png sprites
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Read manual override commands from stdin
    #[arg(long)]
    control_stdin: bool,

    /// Print the intersection status every N simulated seconds
    #[arg(long)]
    summary_every: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };

        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(time_scale) = self.time_scale {
            config.time_scale = time_scale;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(url) = self.events_url {
            config.events.endpoint = Some(url);
        }
        if let Some(path) = self.spill_path {
            config.events.spill_path = path;
        }
        if let Some(path) = self.counts_feed {
            config.counts_feed = Some(path);
        }
        if let Some(path) = self.assets {
            config.assets_dir = Some(path);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .init();

    let cli = Cli::parse();
    let control_stdin = cli.control_stdin;
    let summary_every = cli.summary_every;
    let config = cli.into_config()?;

    let options = RunOptions {
        control: control_stdin.then(runner::spawn_stdin_control),
        summary_every,
    };

    runner::run(config, options).await?;
    Ok(())
}

//! Best-effort event delivery
//!
//! One attempt per event against the configured HTTP collector; anything that
//! does not get a 2xx answer is appended to a local JSON-lines spill file for
//! later replay. At shutdown the worker can be told to give up on the
//! collector so whatever is still queued lands in the spill file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;

use super::error::{SimError, SimResult};
use super::events::Event;

/// HTTP collector accepting one JSON event per POST
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: Client,
    url: String,
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SimResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SimError::Delivery(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn post(&self, event: &Event) -> SimResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| SimError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SimError::Delivery(format!(
                "collector answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Append-only JSON-lines file holding undelivered events
#[derive(Debug, Clone)]
pub struct SpillLog {
    path: PathBuf,
}

impl SpillLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("sim_events.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, event: &Event) -> SimResult<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every spilled event back; malformed lines are skipped
    pub fn read_all(&self) -> SimResult<Vec<Event>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    "Skipping malformed line {} of {}: {}",
                    number + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(events)
    }
}

/// Totals reported by the delivery worker when its channel closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: usize,
    pub spilled: usize,
    pub lost: usize,
}

/// Drain the event channel until every sender is gone
pub async fn run_delivery(
    events: UnboundedReceiver<Event>,
    endpoint: Option<HttpEndpoint>,
    spill: SpillLog,
) -> DeliveryStats {
    let (_cutoff, spill_only) = watch::channel(false);
    run_delivery_with_cutoff(events, endpoint, spill, spill_only).await
}

/// Like `run_delivery`, but once `spill_only` turns true the collector is
/// abandoned, including a request in flight, and the rest of the queue goes
/// straight to the spill file.
pub async fn run_delivery_with_cutoff(
    mut events: UnboundedReceiver<Event>,
    endpoint: Option<HttpEndpoint>,
    spill: SpillLog,
    mut spill_only: watch::Receiver<bool>,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();

    while let Some(event) = events.recv().await {
        let abandoned = *spill_only.borrow();
        let attempt = match &endpoint {
            Some(_) if abandoned => {
                Err(SimError::Delivery("collector abandoned at shutdown".into()))
            }
            Some(endpoint) => {
                tokio::select! {
                    result = endpoint.post(&event) => result,
                    _ = cutoff_requested(&mut spill_only) => {
                        warn!("Giving up on {}; spilling the remaining events", endpoint.url());
                        Err(SimError::Delivery("collector abandoned at shutdown".into()))
                    }
                }
            }
            None => Err(SimError::Delivery("no collector configured".into())),
        };

        match attempt {
            Ok(()) => stats.delivered += 1,
            Err(e) => {
                debug!("Spilling {:?} event: {}", event.kind, e);
                match spill.append(&event).await {
                    Ok(()) => stats.spilled += 1,
                    Err(e) => {
                        warn!(
                            "Could not spill event to {}: {}",
                            spill.path().display(),
                            e
                        );
                        stats.lost += 1;
                    }
                }
            }
        }
    }

    stats
}

/// Resolves once the cutoff is set; never resolves if its sender is gone
async fn cutoff_requested(spill_only: &mut watch::Receiver<bool>) {
    let requested = spill_only.wait_for(|cut| *cut).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}

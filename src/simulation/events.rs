//! Structured event stream
//!
//! Every state transition of the engine becomes an append-only `Event`. The
//! sink keeps a journal in memory, logs each event as a JSON line and, when
//! a delivery worker is attached, forwards it without ever blocking the tick.
//! A sink with a delivery worker only keeps the most recent events; the
//! complete record is whatever the worker delivered or spilled.

use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;

use super::types::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SignalChanged,
    AmbulanceDetected,
    EmergencyCleared,
    ManualSignalChange,
    ManualModeActivated,
    ManualModeDeactivated,
    AnomalyDetected,
    AssetMissing,
}

/// One record of the event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Wall-clock seconds since the Unix epoch
    pub ts: f64,
    /// Simulated seconds since the start of the run
    pub sim_time: f64,
    #[serde(rename = "event")]
    pub kind: EventKind,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Event {
    pub fn new(kind: EventKind, sim_time: f64, payload: Value) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        Self {
            ts,
            sim_time,
            kind,
            payload,
        }
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Events kept in memory by a sink that forwards to a delivery worker
pub const DEFAULT_JOURNAL_LIMIT: usize = 10_000;

/// Collects events and forwards them to an optional delivery worker
#[derive(Debug, Default)]
pub struct EventSink {
    journal: Vec<Event>,
    /// Keep at least this many of the newest events; unbounded when `None`
    journal_limit: Option<usize>,
    emitted: usize,
    delivery: Option<UnboundedSender<Event>>,
}

impl EventSink {
    /// Journal only; nothing leaves the process
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_delivery(delivery: UnboundedSender<Event>) -> Self {
        Self {
            journal_limit: Some(DEFAULT_JOURNAL_LIMIT),
            delivery: Some(delivery),
            ..Self::default()
        }
    }

    /// Bound the in-memory journal to roughly the newest `limit` events
    pub fn with_journal_limit(mut self, limit: usize) -> Self {
        self.journal_limit = Some(limit.max(1));
        self
    }

    pub fn emit(&mut self, kind: EventKind, sim_time: f64, payload: Value) {
        let event = Event::new(kind, sim_time, payload);

        match serde_json::to_string(&event) {
            Ok(line) => info!(target: "events", "{}", line),
            Err(e) => warn!("Could not serialise {:?} event: {}", kind, e),
        }

        if let Some(delivery) = &self.delivery {
            if delivery.send(event.clone()).is_err() {
                warn!("Event delivery worker is gone; keeping events in memory only");
                self.delivery = None;
            }
        }

        self.journal.push(event);
        self.emitted += 1;

        // Trim in batches so the journal stays between `limit` and `2 * limit`
        if let Some(limit) = self.journal_limit {
            if self.journal.len() >= 2 * limit {
                let excess = self.journal.len() - limit;
                self.journal.drain(..excess);
            }
        }
    }

    /// Events still held in memory, oldest first
    pub fn journal(&self) -> &[Event] {
        &self.journal
    }

    /// Events emitted over the sink's lifetime, including trimmed ones
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.journal.iter().filter(move |e| e.kind == kind)
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Stop forwarding so the delivery worker can drain and finish
    pub fn close(&mut self) {
        self.delivery = None;
    }
}

/// Rebuild the order in which directions received green from `signal_changed`
/// events. The first event's origin leads the sequence when known.
pub fn replay_cycle<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<Direction> {
    let mut cycle = Vec::new();
    for event in events
        .into_iter()
        .filter(|e| e.kind == EventKind::SignalChanged)
    {
        if cycle.is_empty() {
            if let Some(from) = event.field_str("from").and_then(|s| s.parse().ok()) {
                cycle.push(from);
            }
        }
        if let Some(to) = event.field_str("to").and_then(|s| s.parse().ok()) {
            cycle.push(to);
        }
    }
    cycle
}

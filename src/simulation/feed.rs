//! External queue-count providers
//!
//! A detection process can publish lane counts instead of the engine's own
//! lane contents. Providers are only consulted for green-time estimates and
//! are allowed to be slow or stale.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::error::{SimError, SimResult};
use super::green_time::QueueCounts;
use super::types::Direction;

/// One published record: direction -> lane -> category counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    #[serde(default)]
    pub counts: BTreeMap<Direction, BTreeMap<u8, QueueCounts>>,
}

impl QueueRecord {
    /// All lanes of one direction merged; a direction absent from the record
    /// counts as empty
    pub fn counts_for(&self, direction: Direction) -> QueueCounts {
        let mut merged = QueueCounts::new();
        if let Some(lanes) = self.counts.get(&direction) {
            for counts in lanes.values() {
                merged.merge(counts);
            }
        }
        merged
    }
}

/// Source of externally detected queue counts
pub trait CountsFeed: Send + Sync {
    fn latest(&self, current: Option<Direction>, next: Direction) -> SimResult<QueueRecord>;
}

impl<F> CountsFeed for F
where
    F: Fn(Option<Direction>, Direction) -> SimResult<QueueRecord> + Send + Sync,
{
    fn latest(&self, current: Option<Direction>, next: Direction) -> SimResult<QueueRecord> {
        self(current, next)
    }
}

#[derive(Debug, Default)]
struct FeedCache {
    modified: Option<SystemTime>,
    record: Option<QueueRecord>,
}

/// Reads the last JSON line of a file written by a detection process
#[derive(Debug)]
pub struct JsonlCountsFeed {
    path: PathBuf,
    cache: Mutex<FeedCache>,
}

impl JsonlCountsFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(FeedCache::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file if it changed since the last successful read
    fn refresh(&self, cache: &mut FeedCache) -> SimResult<()> {
        let modified = std::fs::metadata(&self.path)?.modified()?;
        if cache.modified.is_some_and(|seen| modified <= seen) {
            return Ok(());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let line = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .ok_or_else(|| SimError::Feed(format!("{} is empty", self.path.display())))?;

        let record: QueueRecord = serde_json::from_str(line)?;
        debug!("Loaded queue counts from {}", self.path.display());
        cache.record = Some(record);
        cache.modified = Some(modified);
        Ok(())
    }
}

impl CountsFeed for JsonlCountsFeed {
    fn latest(&self, _current: Option<Direction>, _next: Direction) -> SimResult<QueueRecord> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| SimError::Feed("feed cache lock poisoned".into()))?;

        if let Err(e) = self.refresh(&mut cache) {
            warn!(
                "Could not refresh queue counts from {}: {}",
                self.path.display(),
                e
            );
        }

        cache
            .record
            .clone()
            .ok_or_else(|| SimError::Feed(format!("no record read from {}", self.path.display())))
    }
}

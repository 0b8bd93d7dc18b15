//! Processing counters.
//!
//! Written only by the consumption loop, read through [`BridgeMetrics::snapshot`]
//! by the stats reporter. Nothing in the bridge depends on their values.
//!
//! `errors` counts skipped messages only. A batch abandoned because the sink
//! is unavailable adds no errors, but its messages are processed again on
//! redelivery and so count towards `total` once per attempt; an applied
//! prefix of such a batch is counted again in the per-operation counters too.

use crate::events::Operation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

const NO_EVENT: i64 = i64::MIN;

#[derive(Debug)]
pub struct BridgeMetrics {
    creates: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    total: AtomicU64,
    last_event_ms: AtomicI64,
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self {
            creates: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total: AtomicU64::new(0),
            last_event_ms: AtomicI64::new(NO_EVENT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub creates: u64,
    pub updates: u64,
    pub deletes: u64,
    pub errors: u64,
    pub total: u64,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl BridgeMetrics {
    /// Count a message the loop is about to process, redeliveries included.
    pub fn record_attempt(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a successful apply.
    ///
    /// Tombstones are not counted as deletes: they follow a delete event that
    /// already was.
    pub fn record_applied(&self, operation: Operation) {
        let counter = match operation {
            Operation::Create | Operation::Snapshot => Some(&self.creates),
            Operation::Update => Some(&self.updates),
            Operation::Delete => Some(&self.deletes),
            Operation::Tombstone => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        self.last_event_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Count a skipped message.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_event_ms = self.last_event_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            last_event_at: (last_event_ms != NO_EVENT)
                .then(|| DateTime::<Utc>::from_timestamp_millis(last_event_ms))
                .flatten(),
        }
    }
}

impl MetricsSnapshot {
    /// Seconds since the last successful apply.
    pub fn seconds_since_last_event(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_event_at
            .map(|at| now.signed_duration_since(at).num_seconds().max(0))
    }

    pub fn log(&self, message: &str) {
        info!(
            creates = self.creates,
            updates = self.updates,
            deletes = self.deletes,
            errors = self.errors,
            total = self.total,
            last_event_secs_ago = ?self.seconds_since_last_event(Utc::now()),
            "{message}"
        );
    }
}

/// Spawn a task that logs a metrics snapshot every `every` until shutdown.
pub fn spawn_stats_reporter(
    metrics: Arc<BridgeMetrics>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    metrics.snapshot().log("CDC indexing statistics");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

//! In-memory collaborators for driving `CdcBridge` without Kafka or
//! Elasticsearch.
//!
//! `MessageLog` behaves like a set of Kafka partitions with a committed
//! offset per partition; every `MemorySource` built from it is a fresh
//! consumer that resumes from the committed offsets, which is how a restart
//! after a crash looks to the bridge.

#![allow(dead_code)]

use async_trait::async_trait;
use cdc_bridge::error::{SinkError, SourceError};
use cdc_bridge::events::Record;
use cdc_bridge::sync::{ActionKind, BatchSettings, DocumentAction};
use cdc_bridge::{DocumentSink, MessageSource, SourceMessage};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub const USERS: &str = "cdc.public.users";
pub const ORDERS: &str = "cdc.public.orders";

type PartitionKey = (String, i32);

#[derive(Default)]
struct LogState {
    messages: Vec<SourceMessage>,
    next_offset: HashMap<PartitionKey, i64>,
    committed: HashMap<PartitionKey, i64>,
    commits: usize,
    failing_commits: usize,
}

#[derive(Clone, Default)]
pub struct MessageLog {
    state: Arc<Mutex<LogState>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw message and return its offset.
    pub fn append_raw(
        &self,
        topic: &str,
        partition: i32,
        key: Option<Vec<u8>>,
        value: Option<Vec<u8>>,
    ) -> i64 {
        let mut state = self.state.lock().unwrap();
        let next = state
            .next_offset
            .entry((topic.to_string(), partition))
            .or_insert(0);
        let offset = *next;
        *next += 1;

        state.messages.push(SourceMessage {
            key,
            value,
            topic: topic.to_string(),
            partition,
            offset,
        });
        offset
    }

    /// Append a JSON key and optional JSON envelope (`None` = tombstone).
    pub fn append(&self, topic: &str, partition: i32, key: Value, value: Option<Value>) -> i64 {
        self.append_raw(
            topic,
            partition,
            Some(serde_json::to_vec(&key).unwrap()),
            value.map(|v| serde_json::to_vec(&v).unwrap()),
        )
    }

    pub fn committed(&self, topic: &str, partition: i32) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .committed
            .get(&(topic.to_string(), partition))
            .copied()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    /// Make the next `n` commits fail.
    pub fn fail_commits(&self, n: usize) {
        self.state.lock().unwrap().failing_commits = n;
    }

    /// A new consumer positioned at the committed offsets.
    pub fn consumer(&self) -> MemorySource {
        MemorySource {
            log: self.clone(),
            positions: HashMap::new(),
            pending: BTreeMap::new(),
            rewinds: 0,
        }
    }
}

pub struct MemorySource {
    log: MessageLog,
    positions: HashMap<PartitionKey, i64>,
    pending: BTreeMap<PartitionKey, (i64, i64)>,
    pub rewinds: usize,
}

impl MemorySource {
    fn position(&self, state: &LogState, key: &PartitionKey) -> i64 {
        self.positions
            .get(key)
            .or_else(|| state.committed.get(key))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn poll(
        &mut self,
        max_messages: usize,
        timeout: Duration,
    ) -> Result<Vec<SourceMessage>, SourceError> {
        let batch: Vec<SourceMessage> = {
            let state = self.log.state.lock().unwrap();
            let mut cursor: HashMap<PartitionKey, i64> = HashMap::new();
            let mut batch = Vec::new();

            for message in &state.messages {
                if batch.len() >= max_messages {
                    break;
                }
                let key = (message.topic.clone(), message.partition);
                let position = *cursor
                    .entry(key.clone())
                    .or_insert_with(|| self.position(&state, &key));
                if message.offset == position {
                    cursor.insert(key, position + 1);
                    batch.push(message.clone());
                }
            }
            batch
        };

        if batch.is_empty() {
            tokio::time::sleep(timeout).await;
            return Ok(batch);
        }

        for message in &batch {
            let key = (message.topic.clone(), message.partition);
            self.positions.insert(key.clone(), message.offset + 1);
            self.pending
                .entry(key)
                .and_modify(|span| span.1 = message.offset)
                .or_insert((message.offset, message.offset));
        }
        Ok(batch)
    }

    async fn commit(&mut self) -> Result<(), SourceError> {
        let mut state = self.log.state.lock().unwrap();
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(SourceError::Closed);
        }

        for (key, (_, last)) in std::mem::take(&mut self.pending) {
            state.committed.insert(key, last + 1);
        }
        state.commits += 1;
        Ok(())
    }

    async fn rewind(&mut self) -> Result<(), SourceError> {
        for (key, (first, _)) in std::mem::take(&mut self.pending) {
            self.positions.insert(key, first);
        }
        self.rewinds += 1;
        Ok(())
    }
}

#[derive(Default)]
struct SinkState {
    documents: HashMap<(String, String), Record>,
    applied: Vec<DocumentAction>,
    attempts: usize,
    transient_failures: usize,
    fail_on_attempt: Option<usize>,
    rejected_ids: HashSet<String>,
    cancel_after: Option<(usize, watch::Sender<bool>)>,
}

/// Document store keyed by `(collection, document_id)` with injectable
/// failures. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` applies with a transient error.
    pub fn fail_transiently(&self, n: usize) {
        self.state.lock().unwrap().transient_failures = n;
    }

    /// Fail only the `n`th apply (1-based, counted over the sink's lifetime).
    pub fn fail_on_attempt(&self, n: usize) {
        self.state.lock().unwrap().fail_on_attempt = Some(n);
    }

    /// Refuse every write for `document_id`.
    pub fn reject(&self, document_id: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_ids
            .insert(document_id.to_string());
    }

    /// Flip `shutdown` once `n` actions have been applied.
    pub fn cancel_after(&self, n: usize, shutdown: watch::Sender<bool>) {
        self.state.lock().unwrap().cancel_after = Some((n, shutdown));
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
            .map(Value::Object)
    }

    pub fn documents(&self) -> HashMap<(String, String), Record> {
        self.state.lock().unwrap().documents.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().documents.len()
    }

    pub fn applied(&self) -> Vec<DocumentAction> {
        self.state.lock().unwrap().applied.clone()
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn apply(&self, action: &DocumentAction) -> Result<bool, SinkError> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;

        if state.fail_on_attempt == Some(state.attempts) {
            state.fail_on_attempt = None;
            return Err(SinkError::Transient("connection reset".to_string()));
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(SinkError::Transient("connection refused".to_string()));
        }
        if state.rejected_ids.contains(&action.document_id) {
            return Err(SinkError::Rejected("mapper_parsing_exception".to_string()));
        }

        let key = (action.collection.clone(), action.document_id.clone());
        let present = match &action.kind {
            ActionKind::Upsert(body) => {
                state.documents.insert(key, body.clone());
                true
            }
            ActionKind::Delete => state.documents.remove(&key).is_some(),
        };
        state.applied.push(action.clone());

        let applied = state.applied.len();
        if let Some((n, shutdown)) = &state.cancel_after {
            if applied >= *n {
                let _ = shutdown.send(true);
            }
        }
        Ok(present)
    }
}

pub fn settings(max_messages: usize) -> BatchSettings {
    BatchSettings {
        max_messages,
        poll_timeout: Duration::from_millis(10),
        failed_batch_pause: Duration::from_millis(10),
    }
}

pub fn create(after: Value) -> Option<Value> {
    Some(json!({"op": "c", "before": null, "after": after, "ts_ms": 1}))
}

pub fn snapshot(after: Value) -> Option<Value> {
    Some(json!({"op": "r", "before": null, "after": after, "ts_ms": 1}))
}

pub fn update(before: Value, after: Value) -> Option<Value> {
    Some(json!({"op": "u", "before": before, "after": after, "ts_ms": 2}))
}

pub fn delete(before: Value) -> Option<Value> {
    Some(json!({"op": "d", "before": before, "after": null, "ts_ms": 3}))
}

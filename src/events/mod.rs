//! Change-event model and the pure transforms that feed the dispatcher.
//!
//! - **Decoder**: raw Kafka key/value bytes → [`ChangeEvent`]
//! - **Resolver**: topic → collection, key → document id

pub mod decoder;
pub mod resolver;

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

pub use decoder::decode;
pub use resolver::{collection_for, document_id};

/// Field name → value mapping, kept in the order the producer emitted it.
pub type Record = Map<String, Value>;

/// Kind of change a single event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    /// Row emitted by the initial table snapshot.
    Snapshot,
    /// Null-valued message that follows a delete in a compacted topic.
    Tombstone,
}

impl Operation {
    /// Map an envelope `op` code. Tombstones have no code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(Operation::Create),
            "u" => Some(Operation::Update),
            "d" => Some(Operation::Delete),
            "r" => Some(Operation::Snapshot),
            _ => None,
        }
    }

    /// Whether events of this kind carry an after-image.
    pub fn has_after_image(&self) -> bool {
        matches!(
            self,
            Operation::Create | Operation::Update | Operation::Snapshot
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Snapshot => write!(f, "snapshot"),
            Operation::Tombstone => write!(f, "tombstone"),
        }
    }
}

/// One decoded unit of change.
///
/// `after` is present exactly when `operation` is Create, Update or Snapshot.
/// A Tombstone always has a `key`; its `before` is never populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub operation: Operation,
    pub key: Option<Record>,
    pub before: Option<Record>,
    pub after: Option<Record>,
    pub source_topic: String,
    /// `source.table` from the envelope, when the producer sent it.
    pub source_table: Option<String>,
    /// `ts_ms` from the envelope, when the producer sent it.
    pub source_ts_ms: Option<i64>,
}

impl ChangeEvent {
    pub fn is_tombstone(&self) -> bool {
        self.operation == Operation::Tombstone
    }
}

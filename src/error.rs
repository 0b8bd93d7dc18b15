//! Error taxonomy for the bridge.
//!
//! Message-level errors ([`DecodeError`], [`ResolveError`], [`DispatchError`],
//! [`SinkError`]) are folded into [`MessageError`] by the consumption loop and
//! never escalate past the batch, with one exception: a transient
//! [`SinkError`] abandons the batch so its offsets are not committed.
//! [`BridgeError`] covers failures that end the process.

use crate::events::Operation;
use crate::services::elasticsearch::ElasticsearchError;
use thiserror::Error;

/// Malformed change-event envelope. Never retried.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// Well-formed JSON whose fields have the wrong types.
    #[error("change-event envelope has unexpected shape: {0}")]
    InvalidEnvelope(serde_json::Error),
    #[error("message key must be a JSON object")]
    KeyNotAnObject,
    #[error("change-event envelope must be a JSON object")]
    ValueNotAnObject,
    #[error("envelope has no `op` field")]
    MissingOperation,
    #[error("unknown operation code `{0}`")]
    UnknownOperation(String),
    #[error("{0} event has no after-image")]
    MissingAfterImage(Operation),
    #[error("tombstone message has no key")]
    TombstoneWithoutKey,
}

/// The message carries nothing that identifies a destination document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("message has no identifying key")]
    MissingKey,
    #[error("key field `{0}` is null")]
    NullKeyField(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Key(#[from] ResolveError),
    #[error("{0} event has no after-image to upsert")]
    MissingAfterImage(Operation),
}

/// Failure reported by a document sink for one action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Connectivity or overload; the whole batch is redelivered.
    #[error("transient sink failure: {0}")]
    Transient(String),
    /// The store refused the document; the message is skipped.
    #[error("sink rejected document: {0}")]
    Rejected(String),
}

impl SinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::Transient(_))
    }
}

/// Per-message failure as seen by the consumption loop.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl MessageError {
    /// Transient failures abort the batch instead of being skipped.
    pub fn is_transient(&self) -> bool {
        matches!(self, MessageError::Sink(err) if err.is_transient())
    }
}

/// Failures of the message source collaborator.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("message source closed")]
    Closed,
}

/// Process-level failures.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Message source error: {0}")]
    Source(#[from] SourceError),
    #[error("Elasticsearch error: {0}")]
    Elasticsearch(#[from] ElasticsearchError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

//! Change-data-capture bridge from Kafka to Elasticsearch.
//!
//! Consumes change-event envelopes, maps each one to an idempotent document
//! action and applies it, committing offsets only after a whole batch has
//! been applied.

pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod services;
pub mod sink;
pub mod source;
pub mod sync;
pub mod telemetry;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use sink::DocumentSink;
pub use source::{MessageSource, SourceMessage};
pub use sync::CdcBridge;

//! Inspect CDC events without applying them.
//!
//! Reads up to `INSPECT_LIMIT` messages from the bridge's topics under a
//! separate consumer group, and prints one JSON line per message with the
//! decoded event and the document action the bridge would apply. Offsets are
//! never committed.
//!
//! Environment variables (in addition to the bridge's own):
//! - INSPECT_GROUP_ID: consumer group (default: "cdc-inspect")
//! - INSPECT_LIMIT: messages to print before exiting (default: 20)
//! - INSPECT_TIMEOUT_MS: stop after this long without a message (default: 5000)

use anyhow::{Context, Result};
use cdc_bridge::events::decode;
use cdc_bridge::services::KafkaMessageSource;
use cdc_bridge::sync::dispatch;
use cdc_bridge::telemetry::init_tracing;
use cdc_bridge::{BridgeConfig, MessageSource, SourceMessage};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

/// Dry-run description of one message.
fn describe(message: &SourceMessage) -> Value {
    let mut line = json!({
        "topic": message.topic,
        "partition": message.partition,
        "offset": message.offset,
    });

    let event = match decode(
        message.key.as_deref(),
        message.value.as_deref(),
        &message.topic,
    ) {
        Ok(event) => event,
        Err(e) => {
            line["error"] = json!(e.to_string());
            return line;
        }
    };

    line["operation"] = json!(event.operation);
    line["source_table"] = json!(event.source_table);
    line["source_ts_ms"] = json!(event.source_ts_ms);
    line["before"] = json!(event.before);
    line["after"] = json!(event.after);

    match dispatch(event) {
        Ok(action) => line["action"] = json!(action),
        Err(e) => line["error"] = json!(e.to_string()),
    }
    line
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("cdc_bridge=warn,cdc_inspect=info");

    let config = BridgeConfig::from_env()?;
    let group_id: String = env_or("INSPECT_GROUP_ID", "cdc-inspect".to_string())?;
    let limit: usize = env_or("INSPECT_LIMIT", 20)?;
    let idle_timeout = Duration::from_millis(env_or("INSPECT_TIMEOUT_MS", 5000)?);

    let mut source = KafkaMessageSource::connect_with_group(&config, &group_id)
        .context("failed to create Kafka consumer")?;

    info!(group_id = %group_id, topics = ?config.kafka_topics, limit, "Inspecting CDC events");

    let mut printed = 0;
    while printed < limit {
        let batch = source.poll(limit - printed, idle_timeout).await?;
        if batch.is_empty() {
            info!("No more messages within {:?}", idle_timeout);
            break;
        }

        for message in &batch {
            println!("{}", describe(message));
        }
        printed += batch.len();
    }

    info!(printed, "Done");
    Ok(())
}

//! CDC bridge: applies Kafka change events to Elasticsearch.
//!
//! Configuration is read from the environment (see `BridgeConfig`); an
//! optional `.env` file is loaded first.

use cdc_bridge::error::{BridgeError, Result};
use cdc_bridge::metrics::spawn_stats_reporter;
use cdc_bridge::services::{ElasticsearchSink, IndexMappings, KafkaMessageSource};
use cdc_bridge::telemetry::init_tracing;
use cdc_bridge::{BridgeConfig, CdcBridge};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("cdc_bridge=info");

    if let Err(e) = run().await {
        error!(error = %e, "CDC bridge exited with error");
        return Err(e);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = BridgeConfig::from_env()?;
    info!(
        brokers = %config.kafka_brokers,
        group_id = %config.kafka_group_id,
        topics = ?config.kafka_topics,
        elasticsearch = %config.elasticsearch_url,
        "Starting CDC bridge"
    );

    let sink = ElasticsearchSink::new(&config.elasticsearch_url, config.elasticsearch_refresh)?;
    sink.verify_connection()
        .await
        .map_err(|e| BridgeError::Connection(format!("Elasticsearch: {e}")))?;

    let mappings = match &config.elasticsearch_mappings_path {
        Some(path) => IndexMappings::from_file(path)
            .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))?,
        None => IndexMappings::default(),
    };
    sink.ensure_collections(&config.collections(), &mappings)
        .await?;

    let source = KafkaMessageSource::connect(&config)
        .map_err(|e| BridgeError::Connection(format!("Kafka: {e}")))?;
    source
        .verify_connection(METADATA_TIMEOUT)
        .map_err(|e| BridgeError::Connection(format!("Kafka: {e}")))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut bridge = CdcBridge::new(source, sink, config.batch_settings());

    let reporter = config
        .stats_interval()
        .map(|every| spawn_stats_reporter(bridge.metrics(), every, shutdown_rx.clone()));

    let result = bridge.run(shutdown_rx).await;

    if let Some(reporter) = reporter {
        reporter.abort();
    }

    let snapshot = result?;
    snapshot.log("CDC bridge stopped; final statistics");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler; using Ctrl+C only");
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

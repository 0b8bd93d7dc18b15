use crate::config::BridgeConfig;
use crate::error::SourceError;
use crate::source::{MessageSource, SourceMessage};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// First and last offset delivered, per partition, since the last commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSpan {
    first: i64,
    last: i64,
}

/// Kafka consumer with manual, batch-level offset management.
///
/// Auto-commit and auto offset store are disabled; offsets are committed
/// explicitly as `last delivered + 1` per partition.
pub struct KafkaMessageSource {
    consumer: StreamConsumer,
    topics: Vec<String>,
    pending: BTreeMap<(String, i32), PendingSpan>,
}

impl KafkaMessageSource {
    /// Create the consumer and subscribe to `topics`.
    pub fn connect(config: &BridgeConfig) -> Result<Self, SourceError> {
        Self::connect_with_group(config, &config.kafka_group_id)
    }

    /// Same as [`connect`](Self::connect) under a different consumer group.
    pub fn connect_with_group(config: &BridgeConfig, group_id: &str) -> Result<Self, SourceError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", config.kafka_auto_offset_reset.as_str())
            .set(
                "session.timeout.ms",
                config.session_timeout().as_millis().to_string(),
            )
            .create()?;

        let topics: Vec<&str> = config.kafka_topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics)?;

        info!(
            brokers = %config.kafka_brokers,
            group_id = %group_id,
            topics = ?config.kafka_topics,
            "Subscribed to CDC topics"
        );

        Ok(Self {
            consumer,
            topics: config.kafka_topics.clone(),
            pending: BTreeMap::new(),
        })
    }

    /// Fetch cluster metadata for every subscribed topic.
    pub fn verify_connection(&self, timeout: Duration) -> Result<(), SourceError> {
        for topic in &self.topics {
            let metadata = self.consumer.fetch_metadata(Some(topic.as_str()), timeout)?;
            let partitions = metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic)
                .map(|t| t.partitions().len())
                .unwrap_or(0);

            if partitions == 0 {
                // Producers create CDC topics lazily; not fatal
                warn!(topic = %topic, "Topic has no partitions yet");
            } else {
                debug!(topic = %topic, partitions, "Topic metadata fetched");
            }
        }
        Ok(())
    }

    fn track(&mut self, topic: &str, partition: i32, offset: i64) {
        self.pending
            .entry((topic.to_string(), partition))
            .and_modify(|span| span.last = offset)
            .or_insert(PendingSpan {
                first: offset,
                last: offset,
            });
    }
}

#[async_trait]
impl MessageSource for KafkaMessageSource {
    async fn poll(
        &mut self,
        max_messages: usize,
        timeout: Duration,
    ) -> Result<Vec<SourceMessage>, SourceError> {
        let deadline = Instant::now() + timeout;
        let mut batch = Vec::new();

        while batch.len() < max_messages {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let received = match tokio::time::timeout(remaining, self.consumer.recv()).await {
                Err(_elapsed) => break,
                Ok(received) => received,
            };

            match received {
                Ok(message) => batch.push(SourceMessage {
                    key: message.key().map(<[u8]>::to_vec),
                    value: message.payload().map(<[u8]>::to_vec),
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                }),
                Err(e) if batch.is_empty() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "Kafka error mid-batch; returning partial batch");
                    break;
                }
            }
        }

        for message in &batch {
            self.track(&message.topic, message.partition, message.offset);
        }

        Ok(batch)
    }

    async fn commit(&mut self) -> Result<(), SourceError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for ((topic, partition), span) in &self.pending {
            tpl.add_partition_offset(topic, *partition, Offset::Offset(span.last + 1))?;
        }

        // Pending spans survive a failed commit so the next one covers them
        self.consumer.commit(&tpl, CommitMode::Sync)?;
        self.pending.clear();
        Ok(())
    }

    async fn rewind(&mut self) -> Result<(), SourceError> {
        let pending = std::mem::take(&mut self.pending);

        for ((topic, partition), span) in pending {
            self.consumer
                .seek(&topic, partition, Offset::Offset(span.first), SEEK_TIMEOUT)
                .map_err(|e: KafkaError| {
                    warn!(topic = %topic, partition, offset = span.first, error = %e, "Seek failed");
                    e
                })?;
            debug!(topic = %topic, partition, offset = span.first, "Rewound partition");
        }
        Ok(())
    }
}

use crate::error::{BridgeError, MessageError};
use crate::events::{decode, Operation};
use crate::metrics::{BridgeMetrics, MetricsSnapshot};
use crate::sink::DocumentSink;
use crate::source::{MessageSource, SourceMessage};
use crate::sync::dispatcher::dispatch;
use crate::sync::lifecycle::{RunState, ShutdownController};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pacing of the consumption loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub max_messages: usize,
    pub poll_timeout: Duration,
    /// Wait after an aborted batch before polling again.
    pub failed_batch_pause: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_messages: 100,
            poll_timeout: Duration::from_millis(1000),
            failed_batch_pause: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: usize,
    pub skipped: usize,
}

/// Result of one poll/apply/commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Poll returned no messages.
    Idle,
    PollFailed,
    /// Every message was attempted and the offsets were committed.
    Committed(BatchReport),
    /// Every message was attempted but the commit failed; the offsets stay
    /// pending and are covered by the next successful commit.
    Uncommitted(BatchReport),
    /// The sink was unreachable; the batch was rewound for redelivery.
    Aborted { applied: usize, remaining: usize },
}

/// Batch consumption loop.
///
/// Owns the message source and document sink for its lifetime. Messages are
/// applied one at a time in arrival order and the batch is committed only
/// once every message in it has been attempted.
pub struct CdcBridge<S, K> {
    source: S,
    sink: K,
    settings: BatchSettings,
    metrics: Arc<BridgeMetrics>,
}

impl<S, K> CdcBridge<S, K>
where
    S: MessageSource,
    K: DocumentSink,
{
    pub fn new(source: S, sink: K, settings: BatchSettings) -> Self {
        Self::with_metrics(source, sink, settings, Arc::new(BridgeMetrics::default()))
    }

    pub fn with_metrics(
        source: S,
        sink: K,
        settings: BatchSettings,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            source,
            sink,
            settings,
            metrics,
        }
    }

    pub fn metrics(&self) -> Arc<BridgeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Give back the source and sink, e.g. to inspect them after a run.
    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }

    /// Run until cancellation is observed between batches.
    ///
    /// Returns the final metrics snapshot. Only a failed rewind ends the loop
    /// with an error; every other failure is absorbed and redelivered or
    /// skipped.
    pub async fn run(
        &mut self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<MetricsSnapshot, BridgeError> {
        let mut controller = ShutdownController::new(shutdown);

        info!(
            max_messages = self.settings.max_messages,
            poll_timeout_ms = self.settings.poll_timeout.as_millis() as u64,
            "Starting CDC bridge loop"
        );

        while controller.observe() == RunState::Running {
            match self.run_cycle().await {
                Ok(BatchOutcome::Aborted { .. }) | Ok(BatchOutcome::PollFailed) => {
                    controller.pause(self.settings.failed_batch_pause).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "CDC bridge loop failed");
                    controller.stop();
                    return Err(e);
                }
            }
        }

        controller.stop();
        Ok(self.metrics.snapshot())
    }

    /// Poll one batch, apply it and commit it.
    pub async fn run_cycle(&mut self) -> Result<BatchOutcome, BridgeError> {
        let batch = match self
            .source
            .poll(self.settings.max_messages, self.settings.poll_timeout)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "Failed to poll message source");
                return Ok(BatchOutcome::PollFailed);
            }
        };

        if batch.is_empty() {
            return Ok(BatchOutcome::Idle);
        }

        let mut report = BatchReport::default();

        for (position, message) in batch.iter().enumerate() {
            self.metrics.record_attempt();

            match self.process_message(message).await {
                Ok(operation) => {
                    self.metrics.record_applied(operation);
                    report.applied += 1;
                }
                Err(e) if e.is_transient() => {
                    let remaining = batch.len() - position;
                    error!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        applied = report.applied,
                        remaining,
                        error = %e,
                        "Document store unavailable; abandoning batch for redelivery"
                    );
                    self.source.rewind().await?;
                    return Ok(BatchOutcome::Aborted {
                        applied: report.applied,
                        remaining,
                    });
                }
                Err(e) => {
                    self.metrics.record_error();
                    report.skipped += 1;
                    warn!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "Skipping CDC message"
                    );
                }
            }
        }

        match self.source.commit().await {
            Ok(()) => {
                debug!(
                    messages = batch.len(),
                    applied = report.applied,
                    skipped = report.skipped,
                    "Committed CDC batch"
                );
                Ok(BatchOutcome::Committed(report))
            }
            Err(e) => {
                warn!(error = %e, messages = batch.len(), "Failed to commit CDC batch offsets");
                Ok(BatchOutcome::Uncommitted(report))
            }
        }
    }

    async fn process_message(&self, message: &SourceMessage) -> Result<Operation, MessageError> {
        let event = decode(
            message.key.as_deref(),
            message.value.as_deref(),
            &message.topic,
        )?;
        let operation = event.operation;
        let action = dispatch(event)?;

        debug!(
            topic = %message.topic,
            offset = message.offset,
            operation = %operation,
            collection = %action.collection,
            document_id = %action.document_id,
            "Applying CDC event"
        );

        if !self.sink.apply(&action).await? {
            debug!(
                collection = %action.collection,
                document_id = %action.document_id,
                "Document already absent"
            );
        }
        Ok(operation)
    }
}

//! Message-source side of the bridge.

use crate::error::SourceError;
use async_trait::async_trait;
use std::time::Duration;

/// One raw message as delivered by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Ordered, partitioned message stream with an externally stored cursor.
///
/// Messages of one partition are returned in offset order. The cursor only
/// moves durably on [`commit`](MessageSource::commit).
#[async_trait]
pub trait MessageSource: Send {
    /// Return up to `max_messages`, waiting at most `timeout`. An empty batch
    /// means there was no work.
    async fn poll(
        &mut self,
        max_messages: usize,
        timeout: Duration,
    ) -> Result<Vec<SourceMessage>, SourceError>;

    /// Durably commit every offset delivered since the last commit.
    async fn commit(&mut self) -> Result<(), SourceError>;

    /// Forget everything delivered since the last commit so the next poll
    /// returns those messages again.
    async fn rewind(&mut self) -> Result<(), SourceError>;
}

//! Document-store side of the bridge.

use crate::error::SinkError;
use crate::sync::DocumentAction;
use async_trait::async_trait;

/// Applies document actions to a searchable store.
///
/// Implementations must be idempotent:
/// - an upsert inserts or replaces the whole document keyed by `document_id`,
///   so applying it twice leaves the same state as applying it once;
/// - a delete of a document that does not exist succeeds.
///
/// Returns `false` when a delete found no document to remove. Connectivity
/// and overload problems are [`SinkError::Transient`]; documents the store
/// refuses are [`SinkError::Rejected`].
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn apply(&self, action: &DocumentAction) -> Result<bool, SinkError>;
}

#[async_trait]
impl<T: DocumentSink + ?Sized> DocumentSink for std::sync::Arc<T> {
    async fn apply(&self, action: &DocumentAction) -> Result<bool, SinkError> {
        (**self).apply(action).await
    }
}

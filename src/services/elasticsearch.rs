use crate::error::SinkError;
use crate::sink::DocumentSink;
use crate::sync::{ActionKind, DocumentAction};
use async_trait::async_trait;
use elasticsearch::{
    http::response::Response,
    http::transport::{BuildError, SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    params::Refresh,
    DeleteParts, Elasticsearch, IndexParts,
};
use serde_json::{json, Map, Value};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ElasticsearchError {
    #[error("invalid Elasticsearch URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build transport: {0}")]
    TransportBuild(#[from] BuildError),
    #[error("transport error: {0}")]
    Transport(#[from] elasticsearch::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Elasticsearch unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read mappings file: {0}")]
    Io(#[from] std::io::Error),
}

/// Explicit index-creation bodies, keyed by collection name.
///
/// Collections without an entry are created with dynamic mapping.
#[derive(Debug, Clone, Default)]
pub struct IndexMappings {
    bodies: Map<String, Value>,
}

impl IndexMappings {
    pub fn from_file(path: &Path) -> Result<Self, ElasticsearchError> {
        let raw = std::fs::read(path)?;
        Self::from_slice(&raw)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, ElasticsearchError> {
        let bodies: Map<String, Value> = serde_json::from_slice(raw)?;
        Ok(Self { bodies })
    }

    pub fn body_for(&self, collection: &str) -> Value {
        self.bodies
            .get(collection)
            .cloned()
            .unwrap_or_else(|| json!({}))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// Document sink backed by an Elasticsearch cluster; one index per collection.
#[derive(Clone)]
pub struct ElasticsearchSink {
    client: Elasticsearch,
    refresh: bool,
}

impl ElasticsearchSink {
    pub fn new(url: &str, refresh: bool) -> Result<Self, ElasticsearchError> {
        let parsed = Url::parse(url)?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let transport = TransportBuilder::new(pool).build()?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            refresh,
        })
    }

    /// Request cluster info; fails if the cluster cannot be reached.
    pub async fn verify_connection(&self) -> Result<(), ElasticsearchError> {
        let response = self.client.info().send().await?;
        let status = response.status_code();

        if !status.is_success() {
            return Err(ElasticsearchError::Unavailable(format!(
                "cluster info returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: Value = response.json().await?;
        info!(
            cluster = body["cluster_name"].as_str().unwrap_or("unknown"),
            version = body["version"]["number"].as_str().unwrap_or("unknown"),
            "Connected to Elasticsearch"
        );
        Ok(())
    }

    /// Create missing indices. Creation failures are logged, not returned:
    /// Elasticsearch creates an index on first write anyway.
    pub async fn ensure_collections(
        &self,
        collections: &[String],
        mappings: &IndexMappings,
    ) -> Result<(), ElasticsearchError> {
        for collection in collections {
            let exists = self
                .client
                .indices()
                .exists(IndicesExistsParts::Index(&[collection.as_str()]))
                .send()
                .await?;

            if exists.status_code().is_success() {
                debug!(index = %collection, "Index already exists");
                continue;
            }

            let response = self
                .client
                .indices()
                .create(IndicesCreateParts::Index(collection))
                .body(mappings.body_for(collection))
                .send()
                .await?;

            let status = response.status_code();
            if status.is_success() {
                info!(index = %collection, "Created index");
            } else {
                let reason = response.text().await.unwrap_or_default();
                warn!(
                    index = %collection,
                    status = status.as_u16(),
                    reason = %reason,
                    "Failed to create index"
                );
            }
        }

        Ok(())
    }

    fn refresh(&self) -> Refresh {
        if self.refresh {
            Refresh::True
        } else {
            Refresh::False
        }
    }

    async fn upsert(
        &self,
        index: &str,
        id: &str,
        body: &Map<String, Value>,
    ) -> Result<bool, SinkError> {
        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .refresh(self.refresh())
            .body(body)
            .send()
            .await
            .map_err(transport_failure)?;

        check_response(response, false).await
    }

    async fn delete(&self, index: &str, id: &str) -> Result<bool, SinkError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .refresh(self.refresh())
            .send()
            .await
            .map_err(transport_failure)?;

        check_response(response, true).await
    }
}

#[async_trait]
impl DocumentSink for ElasticsearchSink {
    async fn apply(&self, action: &DocumentAction) -> Result<bool, SinkError> {
        match &action.kind {
            ActionKind::Upsert(body) => {
                self.upsert(&action.collection, &action.document_id, body)
                    .await
            }
            ActionKind::Delete => self.delete(&action.collection, &action.document_id).await,
        }
    }
}

fn transport_failure(err: elasticsearch::Error) -> SinkError {
    SinkError::Transient(err.to_string())
}

async fn check_response(response: Response, not_found_ok: bool) -> Result<bool, SinkError> {
    let status = response.status_code().as_u16();
    let reason = if (200..300).contains(&status) {
        String::new()
    } else {
        response.text().await.unwrap_or_default()
    };
    response_outcome(status, not_found_ok, reason)
}

/// Decide the result of a write from its HTTP status.
///
/// `Ok(false)` means the document was already absent, which only counts as
/// success when `not_found_ok` is set (deletes).
pub fn response_outcome(
    status: u16,
    not_found_ok: bool,
    reason: String,
) -> Result<bool, SinkError> {
    match status {
        200..=299 => Ok(true),
        404 if not_found_ok => Ok(false),
        _ => Err(classify_status(status, reason)),
    }
}

/// Map a failed HTTP status to a sink error.
///
/// Timeouts, throttling and server errors are transient; any other client
/// error means the document itself was refused.
pub fn classify_status(status: u16, reason: String) -> SinkError {
    let message = format!("HTTP {status}: {reason}");
    match status {
        408 | 429 | 500..=599 => SinkError::Transient(message),
        _ => SinkError::Rejected(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        for status in [408, 429, 500, 502, 503] {
            assert!(classify_status(status, String::new()).is_transient(), "{status}");
        }
        for status in [400, 403, 409, 413] {
            assert!(!classify_status(status, String::new()).is_transient(), "{status}");
        }
    }

    #[test]
    fn test_successful_writes_are_applied() {
        assert_eq!(response_outcome(200, false, String::new()), Ok(true));
        assert_eq!(response_outcome(201, false, String::new()), Ok(true));
        assert_eq!(response_outcome(200, true, String::new()), Ok(true));
    }

    #[test]
    fn test_delete_of_absent_document_succeeds() {
        assert_eq!(response_outcome(404, true, String::new()), Ok(false));
    }

    #[test]
    fn test_missing_index_on_upsert_is_rejected() {
        let err = response_outcome(404, false, "index_not_found_exception".into()).unwrap_err();
        assert!(matches!(err, SinkError::Rejected(ref m) if m.contains("HTTP 404")));
    }

    #[test]
    fn test_unavailable_cluster_is_transient() {
        for not_found_ok in [false, true] {
            let err = response_outcome(503, not_found_ok, "no master".into()).unwrap_err();
            assert!(err.is_transient());
        }
    }

    #[test]
    fn test_index_mappings_fall_back_to_dynamic() {
        let mappings = IndexMappings::from_slice(
            br#"{"users": {"mappings": {"properties": {"email": {"type": "keyword"}}}}}"#,
        )
        .unwrap();

        assert_eq!(mappings.len(), 1);
        assert_eq!(
            mappings.body_for("users")["mappings"]["properties"]["email"]["type"],
            "keyword"
        );
        assert_eq!(mappings.body_for("orders"), json!({}));
    }

    #[test]
    fn test_index_mappings_must_be_an_object() {
        assert!(IndexMappings::from_slice(b"[1, 2]").is_err());
    }

    #[test]
    fn test_sink_builds_from_url() {
        assert!(ElasticsearchSink::new("http://localhost:9200", true).is_ok());
        assert!(matches!(
            ElasticsearchSink::new("not a url", true),
            Err(ElasticsearchError::InvalidUrl(_))
        ));
    }
}

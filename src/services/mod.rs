//! Concrete collaborators: Kafka as the message source, Elasticsearch as the
//! document sink.

pub mod elasticsearch;
pub mod kafka;

pub use self::elasticsearch::{ElasticsearchError, ElasticsearchSink, IndexMappings};
pub use self::kafka::KafkaMessageSource;

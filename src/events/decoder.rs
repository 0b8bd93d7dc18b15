//! Decoding of raw Kafka messages into [`ChangeEvent`]s.
//!
//! Accepts both plain envelopes and envelopes wrapped as
//! `{"schema": {...}, "payload": {...}}` by a converter with schemas enabled.
//! The same unwrapping applies to message keys.

use super::{ChangeEvent, Operation, Record};
use crate::error::DecodeError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    before: Option<Record>,
    #[serde(default)]
    after: Option<Record>,
    #[serde(default)]
    source: Option<SourceInfo>,
    #[serde(default)]
    ts_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SourceInfo {
    #[serde(default)]
    table: Option<String>,
}

/// Decode one message.
///
/// An absent, empty or JSON `null` value is a Tombstone, which requires a key.
pub fn decode(
    key: Option<&[u8]>,
    value: Option<&[u8]>,
    topic: &str,
) -> Result<ChangeEvent, DecodeError> {
    let key = decode_key(key)?;

    let Some(fields) = decode_value(value)? else {
        let key = key.ok_or(DecodeError::TombstoneWithoutKey)?;
        return Ok(ChangeEvent {
            operation: Operation::Tombstone,
            key: Some(key),
            before: None,
            after: None,
            source_topic: topic.to_owned(),
            source_table: None,
            source_ts_ms: None,
        });
    };

    let envelope: Envelope =
        serde_json::from_value(Value::Object(fields)).map_err(DecodeError::InvalidEnvelope)?;

    let code = envelope.op.ok_or(DecodeError::MissingOperation)?;
    let operation = match Operation::from_code(&code) {
        Some(operation) => operation,
        None => return Err(DecodeError::UnknownOperation(code)),
    };

    let after = if operation.has_after_image() {
        Some(
            envelope
                .after
                .ok_or(DecodeError::MissingAfterImage(operation))?,
        )
    } else {
        None
    };

    let before = match operation {
        Operation::Create | Operation::Snapshot => None,
        _ => envelope.before,
    };

    Ok(ChangeEvent {
        operation,
        key,
        before,
        after,
        source_topic: topic.to_owned(),
        source_table: envelope.source.and_then(|source| source.table),
        source_ts_ms: envelope.ts_ms,
    })
}

fn decode_key(raw: Option<&[u8]>) -> Result<Option<Record>, DecodeError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };

    match unwrap_schema(serde_json::from_slice(raw)?) {
        Value::Null => Ok(None),
        Value::Object(fields) => Ok(Some(fields)),
        _ => Err(DecodeError::KeyNotAnObject),
    }
}

fn decode_value(raw: Option<&[u8]>) -> Result<Option<Record>, DecodeError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };

    match unwrap_schema(serde_json::from_slice(raw)?) {
        Value::Null => Ok(None),
        Value::Object(fields) => Ok(Some(fields)),
        _ => Err(DecodeError::ValueNotAnObject),
    }
}

fn non_empty(raw: Option<&[u8]>) -> Option<&[u8]> {
    raw.filter(|bytes| !bytes.iter().all(u8::is_ascii_whitespace))
}

/// Strip a `{"schema", "payload"}` wrapper if present.
fn unwrap_schema(value: Value) -> Value {
    match value {
        Value::Object(mut fields)
            if fields.contains_key("schema") && fields.contains_key("payload") =>
        {
            fields.remove("payload").unwrap_or(Value::Null)
        }
        other => other,
    }
}

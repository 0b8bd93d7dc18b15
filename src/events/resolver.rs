//! Destination naming: topic → collection and key → document id.
//!
//! Multi-field keys are joined in the order their fields appear in the
//! message key. Change-capture producers emit key fields in primary-key column
//! order, which is fixed by the table schema, so the same source row always
//! yields the same id.

use super::Record;
use crate::error::ResolveError;
use serde_json::Value;

/// Separator between the values of a composite key.
pub const KEY_SEPARATOR: &str = "_";

/// Collection name for a topic or table identifier.
///
/// Uses the last dot-delimited segment (`cdc.public.orders` → `orders`), or the
/// whole identifier when there is no usable segment. Lower-cased because index
/// names must be, so tables differing only in case (`Users` and `users`)
/// share one collection and their ids may collide.
pub fn collection_for(source: &str) -> String {
    let name = match source.rsplit_once('.') {
        Some((_, last)) if !last.is_empty() => last,
        _ => source,
    };
    name.to_lowercase()
}

/// Stable document id for a source record key.
pub fn document_id(key: Option<&Record>) -> Result<String, ResolveError> {
    let key = key.filter(|fields| !fields.is_empty());
    let Some(key) = key else {
        return Err(ResolveError::MissingKey);
    };

    let parts = key
        .iter()
        .map(|(field, value)| render_key_value(field, value))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(parts.join(KEY_SEPARATOR))
}

fn render_key_value(field: &str, value: &Value) -> Result<String, ResolveError> {
    match value {
        Value::Null => Err(ResolveError::NullKeyField(field.to_owned())),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        // Structured key columns keep their compact JSON form
        other => Ok(other.to_string()),
    }
}

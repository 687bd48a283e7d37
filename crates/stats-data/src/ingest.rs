//! Structural validation of decoded input.
//!
//! The only job here is to decide whether a decoded JSON document is a
//! collection of record-like objects. Field contents are not inspected; that
//! is the normalizer's concern.

use serde_json::Value;
use stats_core::error::{Result, StatsError};
use stats_core::models::RawPlayEvent;
use tracing::debug;

/// Turn a decoded JSON document into raw play events.
///
/// The document must be an array whose elements are all JSON objects. An
/// empty array is valid and yields no events. Anything else is
/// [`StatsError::MalformedInput`] and nothing is returned.
pub fn ingest(document: Value) -> Result<Vec<RawPlayEvent>> {
    let Value::Array(items) = document else {
        return Err(StatsError::MalformedInput(format!(
            "expected an array of records, found {}",
            json_type_name(&document)
        )));
    };

    let mut events = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(fields) => events.push(RawPlayEvent::new(fields)),
            other => {
                return Err(StatsError::MalformedInput(format!(
                    "record {} is {}, not an object",
                    index,
                    json_type_name(&other)
                )));
            }
        }
    }

    debug!("ingested {} raw play events", events.len());
    Ok(events)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

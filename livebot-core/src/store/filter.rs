//! Whitelist filtering for persisted option documents.
//!
//! Mirrors the save-time predicate: an object field survives iff its key is
//! an all-digit string (array indices, uids) or a whitelist member. Arrays
//! are always traversed; their indices count as digit keys.

use livebot_plugin_api::Whitelist;
use serde_json::Value;

/// Produce the persistable subset of a value tree.
pub fn filter_persisted(value: &Value, whitelist: &Whitelist) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| whitelist.persists(key))
                .map(|(key, inner)| (key.clone(), filter_persisted(inner, whitelist)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| filter_persisted(item, whitelist))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

//! Update keys and batches

use serde_json::{Map, Value};

/// Identifier of a logical data stream (a builder name, "codebases", "global")
pub type UpdateKey = String;

/// Ordered mapping from update key to payload.
///
/// Backed by a `serde_json::Map` with `preserve_order`, so iteration follows
/// insertion (arrival) order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBatch {
    entries: Map<String, Value>,
}

impl UpdateBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch from a JSON value, returning None unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(entries) => Some(Self { entries }),
            _ => None,
        }
    }

    /// Insert or replace the payload for a key
    pub fn insert(&mut self, key: impl Into<UpdateKey>, payload: Value) -> &mut Self {
        self.entries.insert(key.into(), payload);
        self
    }

    /// Payload for a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in arrival order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in arrival order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert back into a JSON object
    pub fn into_value(self) -> Value {
        Value::Object(self.entries)
    }
}

impl From<Map<String, Value>> for UpdateBatch {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

impl<K: Into<UpdateKey>> FromIterator<(K, Value)> for UpdateBatch {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_keeps_arrival_order() {
        let batch = UpdateBatch::from_value(json!({
            "builder1": [1],
            "codebases": [2],
            "builder0": [3]
        }))
        .unwrap();

        let keys: Vec<&str> = batch.keys().collect();
        assert_eq!(keys, vec!["builder1", "codebases", "builder0"]);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(UpdateBatch::from_value(json!([1, 2, 3])).is_none());
        assert!(UpdateBatch::from_value(json!("global")).is_none());
        assert!(UpdateBatch::from_value(Value::Null).is_none());
    }

    #[test]
    fn test_insert_replaces_payload() {
        let mut batch = UpdateBatch::new();
        batch.insert("global", json!({"build_load": 2}));
        batch.insert("global", json!({"build_load": 50}));

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.get("global"), Some(&json!({"build_load": 50})));
    }
}

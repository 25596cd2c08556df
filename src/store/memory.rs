//! In-memory document store
//!
//! Backs unit tests and local development. Writes go through the same
//! merge-upsert semantics as the MongoDB backend so tests exercise the real
//! contract.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{DocumentStore, Filter};
use crate::types::Result;

/// Simple in-memory document store
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Shallow-merge `fields` into `doc`, replacing matched top-level keys only
fn merge_fields(doc: &mut Value, fields: Value) {
    match (doc, fields) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                existing.insert(key, value);
            }
        }
        (doc, fields) => *doc = fields,
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn upsert(&self, collection: &str, key: &str, fields: Value) -> Result<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(key) {
            Some(doc) => merge_fields(doc, fields),
            None => {
                docs.insert(key.to_string(), fields);
            }
        }
        Ok(())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| {
                        filters
                            .iter()
                            .all(|f| doc.get(&f.field) == Some(&f.value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("c", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_merges_without_clobbering_siblings() {
        let store = MemoryStore::new();
        store
            .upsert("c", "k", json!({"a": 1, "b": "keep"}))
            .await
            .unwrap();
        store.upsert("c", "k", json!({"a": 2})).await.unwrap();

        let doc = store.get("c", "k").await.unwrap().unwrap();
        assert_eq!(doc["a"], 2);
        assert_eq!(doc["b"], "keep");
    }

    #[tokio::test]
    async fn test_query_equality_filters() {
        let store = MemoryStore::new();
        store
            .upsert("c", "k1", json!({"grade_id": "g1", "phase": "first"}))
            .await
            .unwrap();
        store
            .upsert("c", "k2", json!({"grade_id": "g1", "phase": "second"}))
            .await
            .unwrap();
        store
            .upsert("c", "k3", json!({"grade_id": "g2", "phase": "first"}))
            .await
            .unwrap();

        let docs = store
            .query("c", &[Filter::eq("grade_id", "g1")])
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);

        let docs = store
            .query(
                "c",
                &[Filter::eq("grade_id", "g1"), Filter::eq("phase", "first")],
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }
}

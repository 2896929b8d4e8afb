// src/store/memory.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::{merge_document, DocumentBackend, StoreError};

type Collections = HashMap<String, HashMap<String, Value>>;

/// In-memory document backend. Insertion order is preserved per collection
/// only incidentally; callers sort by their own fields.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    collections: Arc<Mutex<Collections>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Collections>, StoreError> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

impl DocumentBackend for MemoryBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, body)| (id.clone(), body.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, body)| body.get(field) == Some(value))
                    .map(|(id, body)| (id.clone(), body.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, collection: &str, id: &str, body: &Value) -> Result<(), StoreError> {
        let mut collections = self.lock()?;
        let docs = collections.entry(collection.to_string()).or_default();
        // Same duplicate-key semantics as the SQLite backend's primary key:
        // create never replaces an existing document.
        if docs.contains_key(id) {
            return Err(StoreError::Backend(format!(
                "document already exists: {}/{}",
                collection, id
            )));
        }
        docs.insert(id.to_string(), body.clone());
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<(), StoreError> {
        let mut collections = self.lock()?;
        let body = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
        merge_document(body, patch);
        Ok(())
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        patch: &Value,
        guard_field: &str,
        expected: &Value,
    ) -> Result<(), StoreError> {
        let mut collections = self.lock()?;
        let body = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;

        let current = body.get(guard_field).cloned().unwrap_or(Value::Null);
        if &current != expected {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                status: current.as_str().unwrap_or("unknown").to_string(),
            });
        }

        merge_document(body, patch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_get_and_query() {
        let backend = MemoryBackend::new();
        backend
            .create("users", "u-1", &json!({"username": "jdoe", "email": "j@x.com"}))
            .await
            .unwrap();

        let doc = backend.get("users", "u-1").await.unwrap().unwrap();
        assert_eq!(doc["username"], "jdoe");

        let hits = backend
            .query("users", "username", &json!("jdoe"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = backend
            .query("users", "username", &json!("nobody"))
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn create_refuses_to_replace_an_existing_document() {
        let backend = MemoryBackend::new();
        backend
            .create("reqs", "PWR-1", &json!({"username": "jdoe", "status": "pending"}))
            .await
            .unwrap();

        let err = backend
            .create("reqs", "PWR-1", &json!({"username": "mallory"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));

        // The original document survives the collision.
        let doc = backend.get("reqs", "PWR-1").await.unwrap().unwrap();
        assert_eq!(doc["username"], "jdoe");
        assert_eq!(doc["status"], "pending");
    }

    #[tokio::test]
    async fn update_merges_and_clears_with_null() {
        let backend = MemoryBackend::new();
        backend
            .create("users", "u-1", &json!({"a": 1, "b": 2}))
            .await
            .unwrap();
        backend
            .update("users", "u-1", &json!({"b": null, "c": 3}))
            .await
            .unwrap();

        let doc = backend.get("users", "u-1").await.unwrap().unwrap();
        assert_eq!(doc["a"], 1);
        assert_eq!(doc["b"], Value::Null);
        assert_eq!(doc["c"], 3);
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .update("users", "ghost", &json!({"a": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_if_guards_on_current_value() {
        let backend = MemoryBackend::new();
        backend
            .create("reqs", "r-1", &json!({"status": "pending"}))
            .await
            .unwrap();

        backend
            .update_if("reqs", "r-1", &json!({"status": "approved"}), "status", &json!("pending"))
            .await
            .unwrap();

        let err = backend
            .update_if("reqs", "r-1", &json!({"status": "rejected"}), "status", &json!("pending"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::store::document_store::{
    BatchOp, Document, DocumentStore, Precondition, QueryFilter, StoreError,
};

#[derive(Debug)]
struct StoredDocument {
    version: u64,
    body: Value,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, HashMap<String, StoredDocument>>,
    watchers: HashMap<(String, String), watch::Sender<Option<Document>>>,
}

/// In-process implementation of the document store contract. Every mutation
/// is committed under one lock, so preconditions are checked against the
/// state the write actually lands on, and watchers are notified with the
/// committed state.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl Inner {
    fn document(&self, collection: &str, id: &str) -> Option<&StoredDocument> {
        self.collections
            .get(collection)
            .and_then(|documents| documents.get(id))
    }

    fn check_precondition(
        &self,
        collection: &str,
        id: &str,
        precondition: Precondition,
    ) -> Result<(), StoreError> {
        let existing = self.document(collection, id);
        match (precondition, existing) {
            (Precondition::None, _) => Ok(()),
            (Precondition::MustNotExist, None) => Ok(()),
            (Precondition::MustNotExist, Some(_)) => Err(StoreError::AlreadyExists),
            (Precondition::Version(_), None) => Err(StoreError::NotFound),
            (Precondition::Version(expected), Some(document)) => {
                if document.version == expected {
                    Ok(())
                } else {
                    Err(StoreError::VersionConflict)
                }
            }
        }
    }

    fn apply_update(&mut self, collection: &str, id: &str, body: Value) -> u64 {
        let documents = self.collections.entry(collection.to_string()).or_default();
        let version = documents.get(id).map(|doc| doc.version + 1).unwrap_or(1);
        documents.insert(id.to_string(), StoredDocument { version, body });
        version
    }

    fn apply_delete(&mut self, collection: &str, id: &str) {
        if let Some(documents) = self.collections.get_mut(collection) {
            documents.remove(id);
        }
    }

    fn notify(&mut self, collection: &str, id: &str) {
        let key = (collection.to_string(), id.to_string());
        if let Some(sender) = self.watchers.get(&key) {
            let state = self.document(collection, id).map(|doc| Document {
                id: id.to_string(),
                version: doc.version,
                body: doc.body.clone(),
            });
            sender.send_replace(state);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.document(collection, id).map(|doc| Document {
            id: id.to_string(),
            version: doc.version,
            body: doc.body.clone(),
        }))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        body: Value,
        precondition: Precondition,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.check_precondition(collection, id, precondition)?;
        let version = inner.apply_update(collection, id, body);
        inner.notify(collection, id);
        Ok(version)
    }

    async fn query(
        &self,
        collection: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let Some(documents) = inner.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<Document> = documents
            .iter()
            .filter(|(_, doc)| match filter {
                QueryFilter::All => true,
                QueryFilter::FieldEquals(field, value) => {
                    doc.body.get(field) == Some(value)
                }
            })
            .map(|(id, doc)| Document {
                id: id.clone(),
                version: doc.version,
                body: doc.body.clone(),
            })
            .collect();

        // Stable order for callers that iterate; domain ordering (such as
        // oldest-waiting-first) is applied by the repositories.
        results.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(results)
    }

    async fn atomic_batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        // Validate every precondition before applying anything.
        for op in &ops {
            match op {
                BatchOp::Update {
                    collection,
                    id,
                    precondition,
                    ..
                } => inner.check_precondition(collection, id, *precondition)?,
                BatchOp::Delete {
                    collection,
                    id,
                    precondition,
                } => inner.check_precondition(collection, id, *precondition)?,
            }
        }

        for op in &ops {
            match op {
                BatchOp::Update {
                    collection,
                    id,
                    body,
                    ..
                } => {
                    inner.apply_update(collection, id, body.clone());
                    inner.notify(collection, id);
                }
                BatchOp::Delete { collection, id, .. } => {
                    inner.apply_delete(collection, id);
                    inner.notify(collection, id);
                }
            }
        }

        Ok(())
    }

    fn subscribe(&self, collection: &str, id: &str) -> watch::Receiver<Option<Document>> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let current = inner.document(collection, id).map(|doc| Document {
            id: id.to_string(),
            version: doc.version,
            body: doc.body.clone(),
        });
        let key = (collection.to_string(), id.to_string());
        inner
            .watchers
            .entry(key)
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_and_get() {
        let store = MemoryStore::new();

        let version = store
            .update("sessions", "s1", json!({"status": "Waiting"}), Precondition::MustNotExist)
            .await
            .unwrap();
        assert_eq!(version, 1);

        let document = store.get("sessions", "s1").await.unwrap().unwrap();
        assert_eq!(document.version, 1);
        assert_eq!(document.body["status"], "Waiting");
    }

    #[tokio::test]
    async fn test_must_not_exist_rejects_duplicates() {
        let store = MemoryStore::new();

        store
            .update("sessions", "s1", json!({}), Precondition::MustNotExist)
            .await
            .unwrap();

        let result = store
            .update("sessions", "s1", json!({}), Precondition::MustNotExist)
            .await;

        assert!(matches!(result, Err(StoreError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_version_precondition_detects_conflict() {
        let store = MemoryStore::new();

        store
            .update("sessions", "s1", json!({"n": 0}), Precondition::MustNotExist)
            .await
            .unwrap();
        store
            .update("sessions", "s1", json!({"n": 1}), Precondition::Version(1))
            .await
            .unwrap();

        // Stale writer still holding version 1.
        let result = store
            .update("sessions", "s1", json!({"n": 2}), Precondition::Version(1))
            .await;

        assert!(matches!(result, Err(StoreError::VersionConflict)));
    }

    #[tokio::test]
    async fn test_query_field_equals() {
        let store = MemoryStore::new();

        store
            .update("pool", "a", json!({"status": "waiting"}), Precondition::None)
            .await
            .unwrap();
        store
            .update("pool", "b", json!({"status": "matched"}), Precondition::None)
            .await
            .unwrap();

        let filter = QueryFilter::FieldEquals("status".to_string(), json!("waiting"));
        let results = store.query("pool", &filter).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn test_query_missing_collection_is_empty() {
        let store = MemoryStore::new();

        let results = store.query("nothing", &QueryFilter::All).await.unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_atomic_batch_all_or_nothing() {
        let store = MemoryStore::new();

        store
            .update("pool", "a", json!({"status": "waiting"}), Precondition::None)
            .await
            .unwrap();

        // Second op fails its precondition, so the delete must not apply.
        let result = store
            .atomic_batch(vec![
                BatchOp::Delete {
                    collection: "pool".to_string(),
                    id: "a".to_string(),
                    precondition: Precondition::None,
                },
                BatchOp::Update {
                    collection: "sessions".to_string(),
                    id: "s1".to_string(),
                    body: json!({}),
                    precondition: Precondition::Version(7),
                },
            ])
            .await;

        assert!(result.is_err());
        assert!(store.get("pool", "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_atomic_batch_applies_all_ops() {
        let store = MemoryStore::new();

        store
            .update("pool", "a", json!({"status": "waiting"}), Precondition::None)
            .await
            .unwrap();
        store
            .update("sessions", "s1", json!({"status": "Waiting"}), Precondition::None)
            .await
            .unwrap();

        store
            .atomic_batch(vec![
                BatchOp::Delete {
                    collection: "pool".to_string(),
                    id: "a".to_string(),
                    precondition: Precondition::None,
                },
                BatchOp::Update {
                    collection: "sessions".to_string(),
                    id: "s1".to_string(),
                    body: json!({"status": "Active"}),
                    precondition: Precondition::Version(1),
                },
            ])
            .await
            .unwrap();

        assert!(store.get("pool", "a").await.unwrap().is_none());
        let session = store.get("sessions", "s1").await.unwrap().unwrap();
        assert_eq!(session.body["status"], "Active");
        assert_eq!(session.version, 2);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_latest_state() {
        let store = MemoryStore::new();
        let mut receiver = store.subscribe("sessions", "s1");

        assert!(receiver.borrow().is_none());

        store
            .update("sessions", "s1", json!({"status": "Waiting"}), Precondition::None)
            .await
            .unwrap();

        receiver.changed().await.unwrap();
        let document = receiver.borrow().clone().unwrap();
        assert_eq!(document.body["status"], "Waiting");
        assert_eq!(document.version, 1);
    }

    #[tokio::test]
    async fn test_subscribe_after_creation_sees_current_state() {
        let store = MemoryStore::new();

        store
            .update("sessions", "s1", json!({"status": "Active"}), Precondition::None)
            .await
            .unwrap();

        let receiver = store.subscribe("sessions", "s1");
        let document = receiver.borrow().clone().unwrap();
        assert_eq!(document.body["status"], "Active");
    }

    #[tokio::test]
    async fn test_batch_delete_notifies_with_none() {
        let store = MemoryStore::new();

        store
            .update("pool", "a", json!({"status": "waiting"}), Precondition::None)
            .await
            .unwrap();
        let mut receiver = store.subscribe("pool", "a");

        store
            .atomic_batch(vec![BatchOp::Delete {
                collection: "pool".to_string(),
                id: "a".to_string(),
                precondition: Precondition::None,
            }])
            .await
            .unwrap();

        receiver.changed().await.unwrap();
        assert!(receiver.borrow().is_none());
    }
}

//! Hosted document store port.
//!
//! # Responsibility
//! - Describe the minimal document-database surface the repositories need:
//!   collections of JSON objects keyed by store-assigned ids.
//! - Provide `InMemoryDocumentStore`, an in-process implementation used when
//!   no hosted adapter is wired and by tests.
//!
//! # Invariants
//! - Document bodies never contain the `id` key; the id lives beside them.
//! - `insert` always assigns a fresh id; `set` writes under a caller id.

use super::{StoreError, StoreResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// One stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

/// Hosted document database surface.
pub trait DocumentStore {
    fn list(&self, collection: &str) -> StoreResult<Vec<Document>>;
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;
    /// Stores `data` under a newly generated id and returns it.
    fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<String>;
    /// Creates or overwrites the document `id`.
    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> StoreResult<()>;
    /// Returns whether a document was removed.
    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;
    /// Removes every document in `collection`.
    fn clear(&self, collection: &str) -> StoreResult<()>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        (**self).list(collection)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        (**self).get(collection, id)
    }

    fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<String> {
        (**self).insert(collection, data)
    }

    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> StoreResult<()> {
        (**self).set(collection, id, data)
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        (**self).delete(collection, id)
    }

    fn clear(&self, collection: &str) -> StoreResult<()> {
        (**self).clear(collection)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        (**self).list(collection)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        (**self).get(collection, id)
    }

    fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<String> {
        (**self).insert(collection, data)
    }

    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> StoreResult<()> {
        (**self).set(collection, id, data)
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        (**self).delete(collection, id)
    }

    fn clear(&self, collection: &str) -> StoreResult<()> {
        (**self).clear(collection)
    }
}

type Collections = BTreeMap<String, BTreeMap<String, Map<String, Value>>>;

/// Thread-safe in-process document store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<Collections>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Backend("document store lock poisoned".to_string()))
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let guard = self.lock()?;
        Ok(guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let guard = self.lock()?;
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.lock()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        Ok(id)
    }

    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> StoreResult<()> {
        self.lock()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        Ok(self
            .lock()?
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    fn clear(&self, collection: &str) -> StoreResult<()> {
        self.lock()?.remove(collection);
        Ok(())
    }
}

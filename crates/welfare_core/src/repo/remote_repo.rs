//! Hosted document store backed repository.
//!
//! # Invariants
//! - The store assigns ids for `add`; `add_with_id` and `replace_all` keep the
//!   ids they are given.
//! - `get_all` returns the newest `createdAt` first, ties broken by id.
//! - `replace_all` encodes every record before clearing the collection. The
//!   store has no batch write, so a store failure after the clear leaves the
//!   collection partially written.

use super::{RepoError, RepoResult, Repository};
use crate::clock::Clock;
use crate::config::BackendKind;
use crate::model::Entity;
use crate::store::{Document, DocumentStore};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

const ID_FIELD: &str = "id";

pub struct RemoteRepository<T, S> {
    store: S,
    clock: Arc<dyn Clock>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, S: DocumentStore> RemoteRepository<T, S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            _entity: PhantomData,
        }
    }

    fn fetch(&self, id: &str) -> RepoResult<Option<T>> {
        self.store
            .get(T::COLLECTION, id)?
            .map(decode::<T>)
            .transpose()
    }
}

impl<T: Entity, S: DocumentStore> Repository<T> for RemoteRepository<T, S> {
    fn backend(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn get_all(&self) -> RepoResult<Vec<T>> {
        let mut records = self
            .store
            .list(T::COLLECTION)?
            .into_iter()
            .map(decode::<T>)
            .collect::<RepoResult<Vec<T>>>()?;
        records.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(records)
    }

    fn get(&self, id: &str) -> RepoResult<Option<T>> {
        self.fetch(id)
    }

    fn add(&self, draft: T::Draft) -> RepoResult<T> {
        let mut record = T::from_draft(String::new(), draft, self.clock.now_ms());
        let id = self.store.insert(T::COLLECTION, encode(&record)?)?;
        record.set_id(id);
        Ok(record)
    }

    fn add_with_id(&self, record: &T) -> RepoResult<()> {
        if self.store.get(T::COLLECTION, record.id())?.is_some() {
            return Err(RepoError::duplicate::<T>(record.id()));
        }
        self.store
            .set(T::COLLECTION, record.id(), encode(record)?)?;
        Ok(())
    }

    fn update(&self, id: &str, patch: &T::Patch) -> RepoResult<T> {
        let mut record = self.fetch(id)?.ok_or_else(|| RepoError::not_found::<T>(id))?;
        record.apply_patch(patch, self.clock.now_ms());
        self.store.set(T::COLLECTION, id, encode(&record)?)?;
        Ok(record)
    }

    fn delete(&self, id: &str) -> RepoResult<()> {
        if self.store.delete(T::COLLECTION, id)? {
            Ok(())
        } else {
            Err(RepoError::not_found::<T>(id))
        }
    }

    fn replace_all(&self, records: &[T]) -> RepoResult<()> {
        let documents = records
            .iter()
            .map(|record| encode(record).map(|data| (record.id(), data)))
            .collect::<RepoResult<Vec<_>>>()?;

        self.store.clear(T::COLLECTION)?;
        for (id, data) in documents {
            self.store.set(T::COLLECTION, id, data)?;
        }
        Ok(())
    }
}

fn encode<T: Entity>(record: &T) -> RepoResult<Map<String, Value>> {
    match serde_json::to_value(record) {
        Ok(Value::Object(mut map)) => {
            map.remove(ID_FIELD);
            Ok(map)
        }
        Ok(_) => Err(RepoError::InvalidData(format!(
            "{} did not serialize to a JSON object",
            T::KIND
        ))),
        Err(err) => Err(RepoError::InvalidData(format!(
            "{} serialization failed: {err}",
            T::KIND
        ))),
    }
}

fn decode<T: Entity>(document: Document) -> RepoResult<T> {
    let Document { id, mut data } = document;
    data.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    serde_json::from_value(Value::Object(data)).map_err(|err| {
        RepoError::InvalidData(format!(
            "{} document `{id}` in `{}` is malformed: {err}",
            T::KIND,
            T::COLLECTION
        ))
    })
}

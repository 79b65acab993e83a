//! Local key-value backed repository.
//!
//! # Invariants
//! - The whole collection is one JSON array under `T::LOCAL_KEY`, kept in
//!   insertion order.
//! - Generated ids are `<T::ID_PREFIX><epoch-ms>`; on a collision the
//!   millisecond component is bumped until the id is unused.

use super::{RepoError, RepoResult, Repository};
use crate::clock::Clock;
use crate::config::BackendKind;
use crate::model::Entity;
use crate::store::LocalStore;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct LocalRepository<'conn, T> {
    store: LocalStore<'conn>,
    clock: Arc<dyn Clock>,
    _entity: PhantomData<fn() -> T>,
}

impl<'conn, T: Entity> LocalRepository<'conn, T> {
    pub fn new(store: LocalStore<'conn>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            _entity: PhantomData,
        }
    }

    fn load(&self) -> RepoResult<Vec<T>> {
        Ok(self.store.get_json::<Vec<T>>(T::LOCAL_KEY)?.unwrap_or_default())
    }

    fn save(&self, records: &[T]) -> RepoResult<()> {
        self.store.set_json(T::LOCAL_KEY, records)?;
        Ok(())
    }

    fn next_id(&self, records: &[T], now_ms: i64) -> String {
        let mut stamp = now_ms;
        loop {
            let candidate = format!("{}{stamp}", T::ID_PREFIX);
            if !records.iter().any(|record| record.id() == candidate) {
                return candidate;
            }
            stamp += 1;
        }
    }
}

impl<T: Entity> Repository<T> for LocalRepository<'_, T> {
    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    fn get_all(&self) -> RepoResult<Vec<T>> {
        self.load()
    }

    fn add(&self, draft: T::Draft) -> RepoResult<T> {
        let mut records = self.load()?;
        let now_ms = self.clock.now_ms();
        let id = self.next_id(&records, now_ms);
        let record = T::from_draft(id, draft, now_ms);
        records.push(record.clone());
        self.save(&records)?;
        Ok(record)
    }

    fn add_with_id(&self, record: &T) -> RepoResult<()> {
        let mut records = self.load()?;
        if records.iter().any(|existing| existing.id() == record.id()) {
            return Err(RepoError::duplicate::<T>(record.id()));
        }
        records.push(record.clone());
        self.save(&records)
    }

    fn update(&self, id: &str, patch: &T::Patch) -> RepoResult<T> {
        let mut records = self.load()?;
        let now_ms = self.clock.now_ms();
        let record = records
            .iter_mut()
            .find(|record| record.id() == id)
            .ok_or_else(|| RepoError::not_found::<T>(id))?;
        record.apply_patch(patch, now_ms);
        let updated = record.clone();
        self.save(&records)?;
        Ok(updated)
    }

    fn delete(&self, id: &str) -> RepoResult<()> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|record| record.id() != id);
        if records.len() == before {
            return Err(RepoError::not_found::<T>(id));
        }
        self.save(&records)
    }

    fn replace_all(&self, records: &[T]) -> RepoResult<()> {
        self.save(records)
    }
}

//! Storage facade: one repository contract, two backends.
//!
//! # Responsibility
//! - Define `Repository<T>`, the per-entity CRUD/search contract every feature
//!   calls through.
//! - Provide the local key-value implementation and the hosted document store
//!   implementation; the caller picks one at startup.
//! - Own the attachment repository for the auxiliary file store.
//!
//! # Invariants
//! - `add` assigns identifiers and creation timestamps; callers never do.
//! - `add_with_id` restores a record verbatim and rejects an id already in use.
//! - Mutations against a missing id return `RepoError::NotFound`.

use crate::config::BackendKind;
use crate::model::Entity;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod attachment_repo;
pub mod backend;
pub mod local_repo;
pub mod remote_repo;

pub use attachment_repo::{AttachmentRepository, AttachmentRow, SqliteAttachmentRepository};
pub use backend::{SharedDocumentStore, StorageBackend};
pub use local_repo::LocalRepository;
pub use remote_repo::RemoteRepository;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Store(StoreError),
    NotFound { kind: &'static str, id: String },
    DuplicateId { kind: &'static str, id: String },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::DuplicateId { kind, id } => write!(f, "{kind} id already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.into())
    }
}

impl RepoError {
    pub(crate) fn not_found<T: Entity>(id: &str) -> Self {
        Self::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate<T: Entity>(id: &str) -> Self {
        Self::DuplicateId {
            kind: T::KIND,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Per-entity persistence contract shared by both backends.
pub trait Repository<T: Entity> {
    /// Which backend serves this repository.
    fn backend(&self) -> BackendKind;

    fn get_all(&self) -> RepoResult<Vec<T>>;

    fn get(&self, id: &str) -> RepoResult<Option<T>> {
        Ok(self
            .get_all()?
            .into_iter()
            .find(|record| record.id() == id))
    }

    /// Persists a new record and returns it with id and timestamps filled.
    fn add(&self, draft: T::Draft) -> RepoResult<T>;

    /// Re-inserts a previously stored record keeping its id and timestamps.
    fn add_with_id(&self, record: &T) -> RepoResult<()>;

    /// Merges `patch` into the stored record and returns the result.
    fn update(&self, id: &str, patch: &T::Patch) -> RepoResult<T>;

    fn delete(&self, id: &str) -> RepoResult<()>;

    /// Case-insensitive substring search; a blank term returns everything.
    fn search(&self, term: &str) -> RepoResult<Vec<T>> {
        let needle = term.trim().to_lowercase();
        let all = self.get_all()?;
        if needle.is_empty() {
            return Ok(all);
        }
        Ok(all
            .into_iter()
            .filter(|record| record.matches(&needle))
            .collect())
    }

    /// Replaces the whole collection with `records` (no merge).
    fn replace_all(&self, records: &[T]) -> RepoResult<()>;
}

impl<T: Entity, R: Repository<T> + ?Sized> Repository<T> for Box<R> {
    fn backend(&self) -> BackendKind {
        (**self).backend()
    }

    fn get_all(&self) -> RepoResult<Vec<T>> {
        (**self).get_all()
    }

    fn get(&self, id: &str) -> RepoResult<Option<T>> {
        (**self).get(id)
    }

    fn add(&self, draft: T::Draft) -> RepoResult<T> {
        (**self).add(draft)
    }

    fn add_with_id(&self, record: &T) -> RepoResult<()> {
        (**self).add_with_id(record)
    }

    fn update(&self, id: &str, patch: &T::Patch) -> RepoResult<T> {
        (**self).update(id, patch)
    }

    fn delete(&self, id: &str) -> RepoResult<()> {
        (**self).delete(id)
    }

    fn search(&self, term: &str) -> RepoResult<Vec<T>> {
        (**self).search(term)
    }

    fn replace_all(&self, records: &[T]) -> RepoResult<()> {
        (**self).replace_all(records)
    }
}

impl<T: Entity, R: Repository<T> + ?Sized> Repository<T> for &R {
    fn backend(&self) -> BackendKind {
        (**self).backend()
    }

    fn get_all(&self) -> RepoResult<Vec<T>> {
        (**self).get_all()
    }

    fn get(&self, id: &str) -> RepoResult<Option<T>> {
        (**self).get(id)
    }

    fn add(&self, draft: T::Draft) -> RepoResult<T> {
        (**self).add(draft)
    }

    fn add_with_id(&self, record: &T) -> RepoResult<()> {
        (**self).add_with_id(record)
    }

    fn update(&self, id: &str, patch: &T::Patch) -> RepoResult<T> {
        (**self).update(id, patch)
    }

    fn delete(&self, id: &str) -> RepoResult<()> {
        (**self).delete(id)
    }

    fn search(&self, term: &str) -> RepoResult<Vec<T>> {
        (**self).search(term)
    }

    fn replace_all(&self, records: &[T]) -> RepoResult<()> {
        (**self).replace_all(records)
    }
}

//! Raw storage backends underneath the repositories.
//!
//! # Responsibility
//! - `LocalStore`: browser-local style key-value store persisted in SQLite.
//! - `DocumentStore`: port for the hosted document database, with an
//!   in-process implementation.
//!
//! # Invariants
//! - Values under local keys are JSON text; unparseable values surface as
//!   `StoreError::Serialization`, never as silently empty data.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod document;
pub mod local;

pub use document::{Document, DocumentStore, InMemoryDocumentStore};
pub use local::LocalStore;

/// Fixed keys used in the local key-value store.
pub mod keys {
    pub const SESSION: &str = "userSession";
    pub const TRUSTED_DEVICE: &str = "masterDeviceFlag";
    pub const TRUSTED_DEVICE_SET_AT: &str = "masterDeviceSetDate";
    pub const LAST_BACKUP: &str = "lastBackupDate";
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization {
        key: String,
        source: serde_json::Error,
    },
    /// Hosted backend failure (network, permission, quota).
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization { key, source } => {
                write!(f, "invalid JSON stored under `{key}`: {source}")
            }
            Self::Backend(message) => write!(f, "document store failure: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization { source, .. } => Some(source),
            Self::Backend(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

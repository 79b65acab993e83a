//! Startup backend selection.
//!
//! # Invariants
//! - The backend is chosen once; every repository handed out afterwards
//!   targets the same backend.
//! - Requesting the hosted backend without a connected document store falls
//!   back to the local store.

use super::{LocalRepository, RemoteRepository, Repository};
use crate::clock::Clock;
use crate::config::{AppConfig, BackendKind};
use crate::model::family::FamilyRecord;
use crate::model::Entity;
use crate::model::user::UserAccount;
use crate::store::{DocumentStore, LocalStore};
use log::{info, warn};
use std::sync::Arc;

/// Shared handle to a hosted document store.
pub type SharedDocumentStore = Arc<dyn DocumentStore + Send + Sync>;

/// The storage backend the application runs against.
pub struct StorageBackend<'conn> {
    kind: BackendKind,
    local: LocalStore<'conn>,
    remote: Option<SharedDocumentStore>,
    clock: Arc<dyn Clock>,
}

impl<'conn> StorageBackend<'conn> {
    /// Picks the backend requested by `config`.
    pub fn select(
        config: &AppConfig,
        local: LocalStore<'conn>,
        remote: Option<SharedDocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let kind = match (config.backend, remote.is_some()) {
            (BackendKind::Remote, true) => BackendKind::Remote,
            (BackendKind::Remote, false) => {
                warn!(
                    "event=backend_select module=repo status=error requested=remote reason=store_unavailable fallback=local"
                );
                BackendKind::Local
            }
            (BackendKind::Local, _) => BackendKind::Local,
        };
        info!(
            "event=backend_select module=repo status=ok backend={}",
            kind.as_str()
        );

        Self {
            kind,
            local,
            remote: if kind == BackendKind::Remote {
                remote
            } else {
                None
            },
            clock,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Local key-value store; always available for session and device keys.
    pub fn local_store(&self) -> LocalStore<'conn> {
        self.local
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn families(&self) -> Box<dyn Repository<FamilyRecord> + 'conn> {
        self.repository::<FamilyRecord>()
    }

    pub fn users(&self) -> Box<dyn Repository<UserAccount> + 'conn> {
        self.repository::<UserAccount>()
    }

    /// One-line description for status output.
    pub fn summary(&self) -> String {
        match self.kind {
            BackendKind::Local => "backend=local store=sqlite".to_string(),
            BackendKind::Remote => "backend=remote store=documents".to_string(),
        }
    }

    fn repository<T: Entity + 'conn>(&self) -> Box<dyn Repository<T> + 'conn> {
        match &self.remote {
            Some(store) => Box::new(RemoteRepository::<T, _>::new(
                Arc::clone(store),
                Arc::clone(&self.clock),
            )),
            None => Box::new(LocalRepository::<T>::new(
                self.local,
                Arc::clone(&self.clock),
            )),
        }
    }
}

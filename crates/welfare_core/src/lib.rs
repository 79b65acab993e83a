//! Core domain logic for the family welfare records tool.
//! This crate is the single source of truth for business invariants.

pub mod app;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use app::{AppError, AppState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, BackendKind, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::family::{FamilyDraft, FamilyInfo, FamilyPatch, FamilyRecord, FamilyStatus};
pub use model::session::Session;
pub use model::user::{SignupRequest, UserAccount, UserRole, UserStatus};
pub use repo::{
    LocalRepository, RemoteRepository, RepoError, RepoResult, Repository, StorageBackend,
};
pub use service::auth_service::{hash_password, AuthProvider, AuthProviderError, LoginError};
pub use service::family_service::{FamilyService, FamilyServiceError};
pub use service::undo::{UndoError, UndoState, UndoTicket};
pub use store::{DocumentStore, InMemoryDocumentStore, LocalStore};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

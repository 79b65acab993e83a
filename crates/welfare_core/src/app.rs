//! Application state assembled once at startup.
//!
//! # Responsibility
//! - Select the storage backend and build every service against it.
//! - Hold the cached family and user lists through their services.
//!
//! # Invariants
//! - All services share one backend and one clock.
//! - Cached lists are refreshed by full reloads, never patched in place.

use crate::clock::Clock;
use crate::config::{AppConfig, BackendKind};
use crate::model::family::FamilyRecord;
use crate::model::session::Session;
use crate::model::user::UserAccount;
use crate::repo::{Repository, SharedDocumentStore, SqliteAttachmentRepository, StorageBackend};
use crate::service::account_service::{AccountError, AccountService};
use crate::service::attachment_service::{AttachmentService, DeviceTrust};
use crate::service::auth_service::{AuthProvider, AuthService, LoginError, SessionStore};
use crate::service::backup_service::{BackupError, BackupService};
use crate::service::family_service::{FamilyService, FamilyServiceError};
use crate::service::stats::{DashboardStats, DataEntryStats};
use crate::store::LocalStore;
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type FamilyRepo<'conn> = Box<dyn Repository<FamilyRecord> + 'conn>;
pub type UserRepo<'conn> = Box<dyn Repository<UserAccount> + 'conn>;

#[derive(Debug)]
pub enum AppError {
    Family(FamilyServiceError),
    Account(AccountError),
    Login(LoginError),
    Backup(BackupError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Family(err) => write!(f, "{err}"),
            Self::Account(err) => write!(f, "{err}"),
            Self::Login(err) => write!(f, "{err}"),
            Self::Backup(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Family(err) => Some(err),
            Self::Account(err) => Some(err),
            Self::Login(err) => Some(err),
            Self::Backup(err) => Some(err),
        }
    }
}

impl From<FamilyServiceError> for AppError {
    fn from(value: FamilyServiceError) -> Self {
        Self::Family(value)
    }
}

impl From<AccountError> for AppError {
    fn from(value: AccountError) -> Self {
        Self::Account(value)
    }
}

impl From<LoginError> for AppError {
    fn from(value: LoginError) -> Self {
        Self::Login(value)
    }
}

impl From<BackupError> for AppError {
    fn from(value: BackupError) -> Self {
        Self::Backup(value)
    }
}

/// Everything a UI layer needs, wired against one backend.
pub struct AppState<'conn> {
    config: AppConfig,
    backend: StorageBackend<'conn>,
    pub families: FamilyService<FamilyRepo<'conn>>,
    pub accounts: AccountService<UserRepo<'conn>>,
    pub auth: AuthService<'conn, UserRepo<'conn>>,
    pub backup: BackupService<'conn>,
    pub attachments: AttachmentService<'conn, SqliteAttachmentRepository<'conn>>,
}

impl<'conn> AppState<'conn> {
    /// Builds the services and performs the initial load of both lists.
    pub fn open(
        conn: &'conn Connection,
        config: AppConfig,
        remote: Option<SharedDocumentStore>,
        provider: Option<Arc<dyn AuthProvider>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let local = LocalStore::new(conn);
        let backend = StorageBackend::select(&config, local, remote, Arc::clone(&clock));

        let mut state = Self {
            families: FamilyService::new(
                backend.families(),
                Arc::clone(&clock),
                config.undo_window(),
            ),
            accounts: AccountService::new(backend.users(), provider.clone()),
            auth: AuthService::new(backend.users(), SessionStore::new(local), provider),
            backup: BackupService::new(local, Arc::clone(&clock)),
            attachments: AttachmentService::new(
                SqliteAttachmentRepository::new(conn),
                DeviceTrust::new(local),
                clock,
            ),
            backend,
            config,
        };
        state.reload()?;
        info!(
            "event=app_open module=app status=ok backend={} families={} users={}",
            state.backend_kind().as_str(),
            state.families.families().len(),
            state.accounts.users().len()
        );
        Ok(state)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend_summary(&self) -> String {
        self.backend.summary()
    }

    /// Reloads both cached lists from storage.
    pub fn reload(&mut self) -> Result<(), AppError> {
        self.families.load()?;
        self.accounts.load()?;
        Ok(())
    }

    pub fn dashboard_stats(&self) -> DashboardStats {
        DashboardStats::compute(self.families.families(), self.accounts.users().len())
    }

    pub fn data_entry_stats(&self, now_ms: i64) -> DataEntryStats {
        DataEntryStats::compute(self.families.families(), now_ms)
    }

    /// Restores a JSON backup and refreshes the family list.
    pub fn restore_backup(&mut self, text: &str, actor: &Session) -> Result<usize, AppError> {
        let restored = self.backup.restore(&self.backend.families(), text, actor)?;
        self.families.load()?;
        Ok(restored)
    }
}

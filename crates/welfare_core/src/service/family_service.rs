//! Family record use-cases.
//!
//! # Responsibility
//! - Validate and persist family records for the data-entry and admin paths.
//! - Own the cached family list shown by dashboards.
//! - Drive time-boxed undo for deletions.
//!
//! # Invariants
//! - The cache is replaced by a full reload after every successful mutation
//!   and is left untouched when a mutation fails.
//! - An undone record comes back with its original id and timestamps.
//! - Staff search requires at least two characters; a blank term lists all.
//! - Deletion and its undo are admin-only.

use crate::clock::Clock;
use crate::model::family::{FamilyDraft, FamilyPatch, FamilyRecord, FamilyValidationError};
use crate::model::session::Session;
use crate::model::user::UserRole;
use crate::model::Entity;
use crate::repo::{RepoError, Repository};
use crate::service::auth_service::{require_role, LoginError};
use crate::service::undo::{UndoCoordinator, UndoError, UndoTicket};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Minimum characters for a non-blank data-entry search.
pub const MIN_SEARCH_CHARS: usize = 2;

#[derive(Debug)]
pub enum FamilyServiceError {
    Validation(FamilyValidationError),
    NotFound(String),
    SearchTermTooShort,
    Forbidden(LoginError),
    Undo(UndoError),
    Repo(RepoError),
}

impl Display for FamilyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "family not found: {id}"),
            Self::SearchTermTooShort => write!(
                f,
                "search term must be at least {MIN_SEARCH_CHARS} characters"
            ),
            Self::Forbidden(err) => write!(f, "{err}"),
            Self::Undo(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FamilyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Forbidden(err) => Some(err),
            Self::Undo(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for FamilyServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<FamilyValidationError> for FamilyServiceError {
    fn from(value: FamilyValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<LoginError> for FamilyServiceError {
    fn from(value: LoginError) -> Self {
        Self::Forbidden(value)
    }
}

impl From<UndoError> for FamilyServiceError {
    fn from(value: UndoError) -> Self {
        Self::Undo(value)
    }
}

/// Family service facade over a repository implementation.
pub struct FamilyService<R: Repository<FamilyRecord>> {
    repo: R,
    clock: Arc<dyn Clock>,
    undo: UndoCoordinator<FamilyRecord>,
    families: Vec<FamilyRecord>,
}

impl<R: Repository<FamilyRecord>> FamilyService<R> {
    pub fn new(repo: R, clock: Arc<dyn Clock>, undo_window: Duration) -> Self {
        Self {
            repo,
            clock,
            undo: UndoCoordinator::new(undo_window),
            families: Vec::new(),
        }
    }

    /// Reloads the cached list from storage.
    pub fn load(&mut self) -> Result<&[FamilyRecord], FamilyServiceError> {
        let families = self.repo.get_all().map_err(|err| {
            error!("event=family_load module=service status=error error={err}");
            FamilyServiceError::from(err)
        })?;
        self.families = families;
        Ok(&self.families)
    }

    /// Cached list as of the last reload.
    pub fn families(&self) -> &[FamilyRecord] {
        &self.families
    }

    pub fn get(&self, id: &str) -> Result<FamilyRecord, FamilyServiceError> {
        self.repo
            .get(id)?
            .ok_or_else(|| FamilyServiceError::NotFound(id.to_string()))
    }

    /// Validates and stores a new record stamped with the acting user.
    pub fn create(
        &mut self,
        mut draft: FamilyDraft,
        actor: &Session,
    ) -> Result<FamilyRecord, FamilyServiceError> {
        draft.validate()?;
        draft.last_modified_by = Some(actor.username.clone());

        let record = self.repo.add(draft).map_err(|err| {
            error!("event=family_create module=service status=error error={err}");
            FamilyServiceError::from(err)
        })?;
        info!(
            "event=family_create module=service status=ok id={} backend={}",
            record.id,
            self.repo.backend().as_str()
        );
        self.load()?;
        Ok(record)
    }

    /// Merges `patch` into an existing record.
    ///
    /// A replacement info block is validated before anything is written.
    pub fn update(
        &mut self,
        id: &str,
        mut patch: FamilyPatch,
        actor: &Session,
    ) -> Result<FamilyRecord, FamilyServiceError> {
        if let Some(info) = &patch.family_info {
            info.validate()?;
        }
        patch.last_modified_by = Some(actor.username.clone());

        let record = self.repo.update(id, &patch).map_err(|err| {
            error!("event=family_update module=service status=error id={id} error={err}");
            FamilyServiceError::from(err)
        })?;
        info!("event=family_update module=service status=ok id={id}");
        self.load()?;
        Ok(record)
    }

    /// Deletes a record and opens its undo window.
    pub fn delete_with_undo(
        &mut self,
        id: &str,
        actor: &Session,
    ) -> Result<UndoTicket, FamilyServiceError> {
        require_role(Some(actor), UserRole::Admin)?;
        let record = self
            .repo
            .get(id)?
            .ok_or_else(|| FamilyServiceError::NotFound(id.to_string()))?;

        self.repo.delete(id).map_err(|err| {
            error!("event=family_delete module=service status=error id={id} error={err}");
            FamilyServiceError::from(err)
        })?;
        let ticket = self.undo.arm(id, record, self.clock.now_ms());
        info!(
            "event=family_delete module=service status=ok id={id} undo_expires_at_ms={}",
            ticket.expires_at_ms
        );
        self.load()?;
        Ok(ticket)
    }

    /// Restores the record captured by `ticket` if its window is still open.
    ///
    /// On any failure the pending entry is left as it was, so a storage error
    /// inside the window can be retried by the caller.
    pub fn undo(
        &mut self,
        ticket: &UndoTicket,
        actor: &Session,
    ) -> Result<FamilyRecord, FamilyServiceError> {
        require_role(Some(actor), UserRole::Admin)?;
        let record = match self.undo.check(ticket, self.clock.now_ms()) {
            Ok(record) => record.clone(),
            Err(err) => {
                info!(
                    "event=family_undo module=service status=error id={} error={err}",
                    ticket.record_id
                );
                return Err(err.into());
            }
        };

        self.repo.add_with_id(&record).map_err(|err| {
            error!(
                "event=family_undo module=service status=error id={} error={err}",
                record.id
            );
            FamilyServiceError::from(err)
        })?;
        self.undo.complete(ticket)?;
        info!("event=family_undo module=service status=ok id={}", record.id);
        self.load()?;
        Ok(record)
    }

    /// Closes the undo window for `id` early; returns whether one was open.
    pub fn discard_undo(&mut self, id: &str, actor: &Session) -> Result<bool, FamilyServiceError> {
        require_role(Some(actor), UserRole::Admin)?;
        let discarded = self.undo.cancel(id).is_some();
        if discarded {
            info!("event=family_undo_discard module=service status=ok id={id}");
        }
        Ok(discarded)
    }

    /// Makes every deletion whose window has elapsed permanent.
    pub fn sweep_expired(&mut self) -> Vec<String> {
        self.undo.sweep(self.clock.now_ms())
    }

    /// Data-entry search through the repository.
    pub fn search(&self, term: &str) -> Result<Vec<FamilyRecord>, FamilyServiceError> {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return Ok(self.repo.get_all()?);
        }
        if trimmed.chars().count() < MIN_SEARCH_CHARS {
            return Err(FamilyServiceError::SearchTermTooShort);
        }
        Ok(self.repo.search(trimmed)?)
    }

    /// Admin dashboard filter over the cached list.
    pub fn filter_cached(&self, term: &str) -> Vec<FamilyRecord> {
        let needle = term.trim().to_lowercase();
        self.families
            .iter()
            .filter(|record| needle.is_empty() || record.matches(&needle))
            .cloned()
            .collect()
    }

    pub fn undo_coordinator(&self) -> &UndoCoordinator<FamilyRecord> {
        &self.undo
    }
}

#[cfg(test)]
mod tests {
    use super::{FamilyService, FamilyServiceError};
    use crate::clock::{Clock, ManualClock};
    use crate::db::open_db_in_memory;
    use crate::model::family::{FamilyDraft, FamilyInfo, FamilyPatch, FamilyRecord, FamilyStatus};
    use crate::model::session::Session;
    use crate::model::user::UserRole;
    use crate::repo::LocalRepository;
    use crate::store::LocalStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn staff() -> Session {
        Session {
            username: "staff".to_string(),
            role: UserRole::Staff,
            full_name: "Staff Member".to_string(),
            email: String::new(),
        }
    }

    fn draft(name: &str) -> FamilyDraft {
        FamilyDraft::new(FamilyInfo {
            family_name: name.to_string(),
            address: "1 Temple Rd".to_string(),
            contact_number: "0711111111".to_string(),
            number_of_members: 3,
            ..FamilyInfo::default()
        })
    }

    #[test]
    fn create_rejects_invalid_draft_and_keeps_cache() {
        let conn = open_db_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let repo = LocalRepository::<FamilyRecord>::new(LocalStore::new(&conn), clock.clone());
        let mut service = FamilyService::new(repo, clock, Duration::from_secs(60));

        let err = service.create(draft(""), &staff()).unwrap_err();
        assert!(matches!(err, FamilyServiceError::Validation(_)));
        assert!(service.families().is_empty());
    }

    #[test]
    fn create_stamps_actor_and_reloads() {
        let conn = open_db_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let repo = LocalRepository::<FamilyRecord>::new(LocalStore::new(&conn), clock.clone());
        let mut service = FamilyService::new(repo, clock.clone(), Duration::from_secs(60));

        let record = service.create(draft("Silva"), &staff()).unwrap();
        assert_eq!(record.id, "FAM1000");
        assert_eq!(record.last_modified_by.as_deref(), Some("staff"));
        assert_eq!(record.status, FamilyStatus::Active);
        assert_eq!(service.families().len(), 1);

        clock.advance_ms(5);
        let updated = service
            .update(&record.id, FamilyPatch::status(FamilyStatus::Inactive), &staff())
            .unwrap();
        assert_eq!(updated.updated_at, clock.now_ms());
        assert_eq!(service.families()[0].status, FamilyStatus::Inactive);
    }

    #[test]
    fn staff_cannot_delete_or_undo() {
        let conn = open_db_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let repo = LocalRepository::<FamilyRecord>::new(LocalStore::new(&conn), clock.clone());
        let mut service = FamilyService::new(repo, clock, Duration::from_secs(60));
        let record = service.create(draft("Silva"), &staff()).unwrap();

        assert!(matches!(
            service.delete_with_undo(&record.id, &staff()),
            Err(FamilyServiceError::Forbidden(_))
        ));
        assert_eq!(service.families().len(), 1);
        assert!(service.undo_coordinator().state(&record.id).is_none());

        let admin = Session {
            username: "admin".to_string(),
            role: UserRole::Admin,
            ..staff()
        };
        let ticket = service.delete_with_undo(&record.id, &admin).unwrap();
        assert!(matches!(
            service.undo(&ticket, &staff()),
            Err(FamilyServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.discard_undo(&record.id, &staff()),
            Err(FamilyServiceError::Forbidden(_))
        ));
        assert_eq!(service.undo(&ticket, &admin).unwrap().id, record.id);
    }

    #[test]
    fn short_search_term_is_rejected() {
        let conn = open_db_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let repo = LocalRepository::<FamilyRecord>::new(LocalStore::new(&conn), clock.clone());
        let mut service = FamilyService::new(repo, clock, Duration::from_secs(60));
        service.create(draft("Silva"), &staff()).unwrap();

        assert!(matches!(
            service.search("s"),
            Err(FamilyServiceError::SearchTermTooShort)
        ));
        assert_eq!(service.search("  ").unwrap().len(), 1);
        assert_eq!(service.search("SIL").unwrap().len(), 1);
        assert_eq!(service.filter_cached("perera").len(), 0);
    }
}

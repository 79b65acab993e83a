//! Account registration and admin account management.
//!
//! # Responsibility
//! - Register new accounts from the signup form.
//! - Approve, reject, enable/disable and delete accounts on behalf of an admin.
//! - Keep the cached user list the admin dashboard renders.
//!
//! # Invariants
//! - Usernames are unique, built-in account names included.
//! - Admin signups start as `pending-admin` / `pending` and only an admin
//!   approval makes them `admin` / `active`.
//! - An admin never disables, enables or deletes their own account.

use crate::model::session::Session;
use crate::model::user::{
    SignupRequest, SignupValidationError, UserAccount, UserDraft, UserPatch, UserRole, UserStatus,
};
use crate::model::Entity;
use crate::repo::{RepoError, Repository};
use crate::service::auth_service::{
    hash_password, is_reserved_username, AuthProvider, AuthProviderError,
};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug)]
pub enum AccountError {
    Validation(SignupValidationError),
    UsernameTaken(String),
    /// Acting session is not an admin.
    Forbidden,
    /// Admins may not change their own account.
    SelfModification,
    InvalidTransition { from: UserStatus, to: UserStatus },
    NotFound(String),
    Provider(AuthProviderError),
    Repo(RepoError),
}

impl Display for AccountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UsernameTaken(username) => write!(f, "Username `{username}` already exists"),
            Self::Forbidden => write!(f, "only an admin can manage accounts"),
            Self::SelfModification => write!(f, "You cannot modify your own account"),
            Self::InvalidTransition { from, to } => write!(
                f,
                "cannot change account status from {} to {}",
                from.as_str(),
                to.as_str()
            ),
            Self::NotFound(id) => write!(f, "user not found: {id}"),
            Self::Provider(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Provider(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AccountError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub struct AccountService<R: Repository<UserAccount>> {
    repo: R,
    provider: Option<Arc<dyn AuthProvider>>,
    users: Vec<UserAccount>,
}

impl<R: Repository<UserAccount>> AccountService<R> {
    pub fn new(repo: R, provider: Option<Arc<dyn AuthProvider>>) -> Self {
        Self {
            repo,
            provider,
            users: Vec::new(),
        }
    }

    pub fn load(&mut self) -> Result<&[UserAccount], AccountError> {
        self.users = self.repo.get_all()?;
        Ok(&self.users)
    }

    pub fn users(&self) -> &[UserAccount] {
        &self.users
    }

    /// Registers a new account from the signup form.
    ///
    /// With a hosted provider the credential lives there and no hash is
    /// stored; otherwise the password hash is kept on the account.
    pub fn signup(&mut self, request: &SignupRequest) -> Result<UserAccount, AccountError> {
        request.validate().map_err(AccountError::Validation)?;

        let username = request.username.trim().to_string();
        let email = request.email.trim().to_string();
        if is_reserved_username(&username)
            || self
                .repo
                .get_all()?
                .iter()
                .any(|user| user.username == username)
        {
            info!("event=signup module=account status=error reason=username_taken");
            return Err(AccountError::UsernameTaken(username));
        }

        let password_hash = match &self.provider {
            Some(provider) => {
                provider
                    .create_account(&email, &request.password)
                    .map_err(|err| {
                        error!("event=signup module=account status=error stage=provider error={err}");
                        AccountError::Provider(err)
                    })?;
                None
            }
            None => Some(hash_password(&request.password)),
        };

        let (role, status) = request.initial_role_and_status();
        let account = self.repo.add(UserDraft {
            username,
            full_name: request.full_name.trim().to_string(),
            email,
            role,
            organization: request.organization.trim().to_string(),
            status,
            password_hash,
        })?;
        info!(
            "event=signup module=account status=ok id={} role={} account_status={}",
            account.id,
            account.role.as_str(),
            account.status.as_str()
        );
        self.load()?;
        Ok(account)
    }

    /// Grants admin to a pending account.
    pub fn approve(&mut self, id: &str, actor: &Session) -> Result<UserAccount, AccountError> {
        require_admin(actor)?;
        let account = self.find(id)?;
        if account.status != UserStatus::Pending {
            return Err(AccountError::InvalidTransition {
                from: account.status,
                to: UserStatus::Active,
            });
        }

        let patch = UserPatch {
            role: Some(UserRole::Admin),
            status: Some(UserStatus::Active),
            approved_by: Some(actor.username.clone()),
            updated_by: None,
        };
        let updated = self.repo.update(id, &patch)?;
        info!("event=account_approve module=account status=ok id={id}");
        self.load()?;
        Ok(updated)
    }

    /// Removes a pending account.
    pub fn reject(&mut self, id: &str, actor: &Session) -> Result<(), AccountError> {
        require_admin(actor)?;
        let account = self.find(id)?;
        if account.status != UserStatus::Pending {
            return Err(AccountError::InvalidTransition {
                from: account.status,
                to: UserStatus::Pending,
            });
        }
        self.repo.delete(id)?;
        info!("event=account_reject module=account status=ok id={id}");
        self.load()?;
        Ok(())
    }

    /// Toggles an account between `active` and `disabled`.
    pub fn set_status(
        &mut self,
        id: &str,
        status: UserStatus,
        actor: &Session,
    ) -> Result<UserAccount, AccountError> {
        require_admin(actor)?;
        let account = self.find(id)?;
        if account.username == actor.username {
            return Err(AccountError::SelfModification);
        }
        let toggle = matches!(
            (account.status, status),
            (UserStatus::Active, UserStatus::Disabled) | (UserStatus::Disabled, UserStatus::Active)
        );
        if !toggle {
            return Err(AccountError::InvalidTransition {
                from: account.status,
                to: status,
            });
        }

        let patch = UserPatch {
            status: Some(status),
            updated_by: Some(actor.username.clone()),
            ..UserPatch::default()
        };
        let updated = self.repo.update(id, &patch)?;
        info!(
            "event=account_status module=account status=ok id={id} account_status={}",
            status.as_str()
        );
        self.load()?;
        Ok(updated)
    }

    pub fn delete_user(&mut self, id: &str, actor: &Session) -> Result<(), AccountError> {
        require_admin(actor)?;
        let account = self.find(id)?;
        if account.username == actor.username {
            return Err(AccountError::SelfModification);
        }
        self.repo.delete(id)?;
        info!("event=account_delete module=account status=ok id={id}");
        self.load()?;
        Ok(())
    }

    /// Filters the cached list; a blank term returns everyone.
    pub fn search_users(&self, term: &str) -> Vec<UserAccount> {
        let needle = term.trim().to_lowercase();
        self.users
            .iter()
            .filter(|user| needle.is_empty() || user.matches(&needle))
            .cloned()
            .collect()
    }

    /// Accounts waiting for admin approval.
    pub fn pending_approvals(&self) -> Vec<&UserAccount> {
        self.users
            .iter()
            .filter(|user| user.status == UserStatus::Pending)
            .collect()
    }

    fn find(&self, id: &str) -> Result<UserAccount, AccountError> {
        self.repo
            .get(id)?
            .ok_or_else(|| AccountError::NotFound(id.to_string()))
    }
}

fn require_admin(actor: &Session) -> Result<(), AccountError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AccountError::Forbidden)
    }
}

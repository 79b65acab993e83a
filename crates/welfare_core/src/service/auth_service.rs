//! Login, logout and session persistence.
//!
//! # Responsibility
//! - Resolve credentials against the hosted auth provider (if any), the
//!   built-in accounts, and locally registered accounts, in that order.
//! - Persist the logged-in session under the `userSession` key.
//! - Gate role-restricted operations.
//!
//! # Invariants
//! - A `pending` or `disabled` account never gets a session.
//! - Passwords are compared as SHA-256 lowercase hex; plaintext is never
//!   stored or logged.
//! - A corrupt stored session is discarded on load.

use crate::model::is_valid_email;
use crate::model::session::Session;
use crate::model::user::{UserAccount, UserRole, UserStatus};
use crate::repo::{RepoError, Repository};
use crate::store::{keys, LocalStore, StoreError};
use log::{info, warn};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Built-in accounts always accepted by the local login path.
const DEFAULT_ACCOUNTS: [(&str, &str, UserRole, &str); 2] = [
    ("admin", "admin123", UserRole::Admin, "Administrator"),
    ("staff", "staff123", UserRole::Staff, "Staff Member"),
];

/// True for usernames held by a built-in account.
pub fn is_reserved_username(username: &str) -> bool {
    DEFAULT_ACCOUNTS
        .iter()
        .any(|(reserved, ..)| reserved.eq_ignore_ascii_case(username))
}

/// SHA-256 of `password` as lowercase hex.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Failure reported by a hosted authentication provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthProviderError {
    UserNotFound,
    WrongPassword,
    EmailInUse,
    WeakPassword,
    InvalidEmail,
    Unavailable(String),
}

impl AuthProviderError {
    fn is_credential_failure(&self) -> bool {
        matches!(self, Self::UserNotFound | Self::WrongPassword)
    }
}

impl Display for AuthProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound => write!(f, "no account for this email"),
            Self::WrongPassword => write!(f, "incorrect password"),
            Self::EmailInUse => write!(f, "email already registered"),
            Self::WeakPassword => write!(f, "password is too weak"),
            Self::InvalidEmail => write!(f, "invalid email address"),
            Self::Unavailable(message) => write!(f, "auth provider unavailable: {message}"),
        }
    }
}

impl Error for AuthProviderError {}

/// Hosted email/password authentication port.
pub trait AuthProvider: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthProviderError>;
    fn sign_out(&self) -> Result<(), AuthProviderError>;
    /// Registers a new credential; returns the provider's user id.
    fn create_account(&self, email: &str, password: &str) -> Result<String, AuthProviderError>;
}

#[derive(Debug)]
pub enum LoginError {
    MissingCredentials,
    InvalidCredentials,
    PendingApproval,
    Disabled,
    Forbidden { required: UserRole },
    NotLoggedIn,
    Repo(RepoError),
    Store(StoreError),
}

impl Display for LoginError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "Please enter username and password"),
            Self::InvalidCredentials => write!(f, "Invalid username or password"),
            Self::PendingApproval => write!(f, "Your account is pending approval"),
            Self::Disabled => write!(f, "Your account has been disabled"),
            Self::Forbidden { required } => {
                write!(f, "this action requires the {} role", required.as_str())
            }
            Self::NotLoggedIn => write!(f, "no active session"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LoginError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LoginError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<StoreError> for LoginError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Session persistence under the `userSession` key.
#[derive(Clone, Copy)]
pub struct SessionStore<'conn> {
    store: LocalStore<'conn>,
}

impl<'conn> SessionStore<'conn> {
    pub fn new(store: LocalStore<'conn>) -> Self {
        Self { store }
    }

    /// Current session, or `None` when absent or unreadable.
    pub fn load(&self) -> Result<Option<Session>, StoreError> {
        match self.store.get_json::<Session>(keys::SESSION) {
            Ok(session) => Ok(session),
            Err(StoreError::Serialization { .. }) => {
                warn!("event=session_load module=auth status=error reason=corrupt action=discard");
                self.store.remove_item(keys::SESSION)?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.store.set_json(keys::SESSION, session)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove_item(keys::SESSION)?;
        Ok(())
    }
}

/// Fails unless `session` holds exactly `required`.
pub fn require_role(session: Option<&Session>, required: UserRole) -> Result<&Session, LoginError> {
    let session = session.ok_or(LoginError::NotLoggedIn)?;
    if session.role == required {
        Ok(session)
    } else {
        Err(LoginError::Forbidden { required })
    }
}

pub struct AuthService<'conn, R: Repository<UserAccount>> {
    users: R,
    sessions: SessionStore<'conn>,
    provider: Option<Arc<dyn AuthProvider>>,
}

impl<'conn, R: Repository<UserAccount>> AuthService<'conn, R> {
    pub fn new(
        users: R,
        sessions: SessionStore<'conn>,
        provider: Option<Arc<dyn AuthProvider>>,
    ) -> Self {
        Self {
            users,
            sessions,
            provider,
        }
    }

    pub fn current_session(&self) -> Result<Option<Session>, LoginError> {
        Ok(self.sessions.load()?)
    }

    /// Authenticates `identifier` (username or email) and stores the session.
    pub fn login(&self, identifier: &str, password: &str) -> Result<Session, LoginError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let session = match self.login_with_provider(identifier, password)? {
            Some(session) => session,
            None => self.login_locally(identifier, password)?,
        };

        self.sessions.save(&session)?;
        info!(
            "event=login module=auth status=ok username={} role={}",
            session.username,
            session.role.as_str()
        );
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), LoginError> {
        if let Some(provider) = &self.provider {
            if let Err(err) = provider.sign_out() {
                warn!("event=logout module=auth status=error stage=provider error={err}");
            }
        }
        self.sessions.clear()?;
        info!("event=logout module=auth status=ok");
        Ok(())
    }

    /// Hosted path; `Ok(None)` means fall through to local credentials.
    fn login_with_provider(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<Session>, LoginError> {
        let Some(provider) = &self.provider else {
            return Ok(None);
        };

        let users = self.users.get_all()?;
        let email = if is_valid_email(identifier) {
            identifier.to_string()
        } else {
            match users.iter().find(|user| user.username == identifier) {
                Some(user) if !user.email.is_empty() => user.email.clone(),
                _ => return Ok(None),
            }
        };

        match provider.sign_in(&email, password) {
            Ok(()) => {}
            Err(err) if err.is_credential_failure() => return Ok(None),
            Err(err) => {
                warn!("event=login module=auth status=error stage=provider error={err}");
                return Ok(None);
            }
        }

        let Some(profile) = users.iter().find(|user| user.email == email) else {
            warn!("event=login module=auth status=error stage=provider reason=profile_missing");
            return Ok(None);
        };
        if let Err(err) = check_status(profile) {
            if let Err(sign_out_err) = provider.sign_out() {
                warn!("event=logout module=auth status=error stage=provider error={sign_out_err}");
            }
            return Err(err);
        }
        Ok(Some(Session::for_account(profile)))
    }

    fn login_locally(&self, identifier: &str, password: &str) -> Result<Session, LoginError> {
        let hashed = hash_password(password);

        for (username, default_password, role, full_name) in DEFAULT_ACCOUNTS {
            if identifier == username && hashed == hash_password(default_password) {
                return Ok(Session {
                    username: username.to_string(),
                    role,
                    full_name: full_name.to_string(),
                    email: String::new(),
                });
            }
        }

        let users = self.users.get_all()?;
        let account = users.iter().find(|user| {
            (user.username == identifier || user.email == identifier)
                && user.password_hash.as_deref() == Some(hashed.as_str())
        });
        match account {
            Some(account) => {
                check_status(account)?;
                Ok(Session::for_account(account))
            }
            None => {
                info!("event=login module=auth status=error reason=invalid_credentials");
                Err(LoginError::InvalidCredentials)
            }
        }
    }
}

fn check_status(account: &UserAccount) -> Result<(), LoginError> {
    match account.status {
        UserStatus::Active => Ok(()),
        UserStatus::Pending => {
            info!(
                "event=login module=auth status=error reason=pending id={}",
                account.id
            );
            Err(LoginError::PendingApproval)
        }
        UserStatus::Disabled => {
            info!(
                "event=login module=auth status=error reason=disabled id={}",
                account.id
            );
            Err(LoginError::Disabled)
        }
    }
}

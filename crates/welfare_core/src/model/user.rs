//! Platform user account.
//!
//! # Invariants
//! - `username` is unique across the user collection.
//! - Status transitions: `pending -> active` on approval (role becomes
//!   `admin`), `pending -> deleted` on rejection, `active <-> disabled` by an
//!   admin. Nothing else.
//! - `password_hash` is only present for accounts registered against the
//!   local fallback store.

use super::{contains_ci, is_valid_email, Entity};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type UserId = String;

const MIN_FULL_NAME_CHARS: usize = 2;
const MIN_USERNAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserRole {
    Staff,
    Admin,
    /// Signed up as admin, awaiting approval by an existing admin.
    PendingAdmin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Admin => "admin",
            Self::PendingAdmin => "pending-admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Pending,
    Active,
    Disabled,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub organization: String,
    pub status: UserStatus,
    /// SHA-256 hex of the password; persisted under `password`.
    #[serde(default, rename = "password", skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl UserAccount {
    /// Name shown in badges and welcome messages.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

/// Creation input for a user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
    pub organization: String,
    pub status: UserStatus,
    pub password_hash: Option<String>,
}

/// Partial update applied by admin actions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserPatch {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub approved_by: Option<String>,
    pub updated_by: Option<String>,
}

impl Entity for UserAccount {
    type Draft = UserDraft;
    type Patch = UserPatch;

    const KIND: &'static str = "user";
    const LOCAL_KEY: &'static str = "platformUsers";
    const COLLECTION: &'static str = "users";
    const ID_PREFIX: &'static str = "USER";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn from_draft(id: String, draft: UserDraft, now_ms: i64) -> Self {
        Self {
            id,
            username: draft.username,
            full_name: draft.full_name,
            email: draft.email,
            role: draft.role,
            organization: draft.organization,
            status: draft.status,
            password_hash: draft.password_hash,
            created_at: now_ms,
            updated_at: None,
            approved_by: None,
            updated_by: None,
        }
    }

    fn apply_patch(&mut self, patch: &UserPatch, now_ms: i64) {
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(approved_by) = &patch.approved_by {
            self.approved_by = Some(approved_by.clone());
        }
        if let Some(updated_by) = &patch.updated_by {
            self.updated_by = Some(updated_by.clone());
        }
        self.updated_at = Some(now_ms);
    }

    fn matches(&self, needle: &str) -> bool {
        contains_ci(&self.username, needle)
            || contains_ci(&self.full_name, needle)
            || contains_ci(&self.email, needle)
            || contains_ci(&self.organization, needle)
    }
}

/// Self-service registration form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignupRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// `None` when no account type was selected.
    pub role: Option<UserRole>,
    pub organization: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupValidationIssue {
    FullNameTooShort,
    UsernameTooShort,
    UsernameCharacters,
    MalformedEmail,
    PasswordTooShort,
    PasswordMismatch,
    MissingRole,
}

impl SignupValidationIssue {
    pub fn message(self) -> &'static str {
        match self {
            Self::FullNameTooShort => "Full name must be at least 2 characters",
            Self::UsernameTooShort => "Username must be at least 3 characters",
            Self::UsernameCharacters => {
                "Username can only contain letters, numbers, and underscores"
            }
            Self::MalformedEmail => "Please enter a valid email address",
            Self::PasswordTooShort => "Password must be at least 6 characters",
            Self::PasswordMismatch => "Passwords do not match",
            Self::MissingRole => "Please select an account type",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupValidationError {
    pub issues: Vec<SignupValidationIssue>,
}

impl Display for SignupValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages = self
            .issues
            .iter()
            .map(|issue| issue.message())
            .collect::<Vec<_>>();
        write!(f, "{}", messages.join("; "))
    }
}

impl Error for SignupValidationError {}

impl SignupRequest {
    /// Checks the form, collecting every failed rule.
    pub fn validate(&self) -> Result<(), SignupValidationError> {
        let mut issues = Vec::new();
        let full_name = self.full_name.trim();
        let username = self.username.trim();

        if full_name.chars().count() < MIN_FULL_NAME_CHARS {
            issues.push(SignupValidationIssue::FullNameTooShort);
        }
        if username.chars().count() < MIN_USERNAME_CHARS {
            issues.push(SignupValidationIssue::UsernameTooShort);
        }
        if username.is_empty()
            || !username
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            issues.push(SignupValidationIssue::UsernameCharacters);
        }
        if !is_valid_email(self.email.trim()) {
            issues.push(SignupValidationIssue::MalformedEmail);
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            issues.push(SignupValidationIssue::PasswordTooShort);
        }
        if self.password != self.confirm_password {
            issues.push(SignupValidationIssue::PasswordMismatch);
        }
        if self.role.is_none() {
            issues.push(SignupValidationIssue::MissingRole);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(SignupValidationError { issues })
        }
    }

    /// Role and status a new account starts with.
    ///
    /// Admin requests always start as `pending-admin` / `pending`.
    pub fn initial_role_and_status(&self) -> (UserRole, UserStatus) {
        match self.role {
            Some(UserRole::Admin) | Some(UserRole::PendingAdmin) => {
                (UserRole::PendingAdmin, UserStatus::Pending)
            }
            Some(UserRole::Staff) | None => (UserRole::Staff, UserStatus::Active),
        }
    }
}

//! Logged-in session snapshot.
//!
//! Presence of a session grants access to role-gated operations; it carries
//! no expiry or signature.

use super::user::{UserAccount, UserRole};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub username: String,
    pub role: UserRole,
    pub full_name: String,
    #[serde(default)]
    pub email: String,
}

impl Session {
    pub fn for_account(account: &UserAccount) -> Self {
        Self {
            username: account.username.clone(),
            role: account.role,
            full_name: account.display_name().to_string(),
            email: account.email.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use welfare_core::service::account_service::AccountService;
use welfare_core::service::auth_service::{AuthService, SessionStore};
use welfare_core::{
    open_db_in_memory, AuthProvider, AuthProviderError, LocalRepository, LocalStore, LoginError,
    ManualClock, SignupRequest, UserAccount, UserRole, UserStatus,
};

#[derive(Default)]
struct FakeProvider {
    credentials: Mutex<HashMap<String, String>>,
    unavailable: bool,
    sign_ins: Mutex<Vec<String>>,
}

impl AuthProvider for FakeProvider {
    fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthProviderError> {
        if self.unavailable {
            return Err(AuthProviderError::Unavailable("offline".to_string()));
        }
        self.sign_ins.lock().unwrap().push(email.to_string());
        match self.credentials.lock().unwrap().get(email) {
            Some(stored) if stored == password => Ok(()),
            Some(_) => Err(AuthProviderError::WrongPassword),
            None => Err(AuthProviderError::UserNotFound),
        }
    }

    fn sign_out(&self) -> Result<(), AuthProviderError> {
        Ok(())
    }

    fn create_account(&self, email: &str, password: &str) -> Result<String, AuthProviderError> {
        let mut credentials = self.credentials.lock().unwrap();
        if credentials.contains_key(email) {
            return Err(AuthProviderError::EmailInUse);
        }
        credentials.insert(email.to_string(), password.to_string());
        Ok(format!("uid-{email}"))
    }
}

fn signup(username: &str, role: UserRole) -> SignupRequest {
    SignupRequest {
        full_name: "Nimal Perera".to_string(),
        username: username.to_string(),
        email: format!("{username}@example.lk"),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
        role: Some(role),
        organization: "Divisional Secretariat".to_string(),
    }
}

fn users(store: LocalStore<'_>) -> LocalRepository<'_, UserAccount> {
    LocalRepository::new(store, Arc::new(ManualClock::new(1_000)))
}

#[test]
fn default_admin_logs_in_and_session_persists() {
    let conn = open_db_in_memory().unwrap();
    let store = LocalStore::new(&conn);
    let auth = AuthService::new(users(store), SessionStore::new(store), None);

    let session = auth.login("admin", "admin123").unwrap();
    assert_eq!(session.role, UserRole::Admin);
    assert_eq!(auth.current_session().unwrap(), Some(session));

    let raw = store.get_item("userSession").unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["username"], "admin");
    assert_eq!(value["role"], "admin");

    auth.logout().unwrap();
    assert_eq!(auth.current_session().unwrap(), None);
}

#[test]
fn wrong_or_missing_credentials_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = LocalStore::new(&conn);
    let auth = AuthService::new(users(store), SessionStore::new(store), None);

    assert!(matches!(
        auth.login("staff", "wrong"),
        Err(LoginError::InvalidCredentials)
    ));
    assert!(matches!(
        auth.login("  ", "x"),
        Err(LoginError::MissingCredentials)
    ));
    assert_eq!(auth.current_session().unwrap(), None);
}

#[test]
fn local_account_logs_in_by_username_or_email() {
    let conn = open_db_in_memory().unwrap();
    let store = LocalStore::new(&conn);
    let mut accounts = AccountService::new(users(store), None);
    accounts.signup(&signup("nimal", UserRole::Staff)).unwrap();

    let auth = AuthService::new(users(store), SessionStore::new(store), None);
    let by_name = auth.login("nimal", "secret1").unwrap();
    assert_eq!(by_name.role, UserRole::Staff);
    assert_eq!(by_name.full_name, "Nimal Perera");
    let by_email = auth.login("nimal@example.lk", "secret1").unwrap();
    assert_eq!(by_email.username, "nimal");
}

#[test]
fn pending_and_disabled_accounts_never_log_in() {
    let conn = open_db_in_memory().unwrap();
    let store = LocalStore::new(&conn);
    let mut accounts = AccountService::new(users(store), None);
    let pending = accounts.signup(&signup("kamala", UserRole::Admin)).unwrap();
    assert_eq!(pending.status, UserStatus::Pending);
    let staff = accounts.signup(&signup("ruwan", UserRole::Staff)).unwrap();

    let admin = welfare_core::Session {
        username: "admin".to_string(),
        role: UserRole::Admin,
        full_name: "Administrator".to_string(),
        email: String::new(),
    };
    accounts
        .set_status(&staff.id, UserStatus::Disabled, &admin)
        .unwrap();

    let auth = AuthService::new(users(store), SessionStore::new(store), None);
    assert!(matches!(
        auth.login("kamala", "secret1"),
        Err(LoginError::PendingApproval)
    ));
    assert!(matches!(
        auth.login("ruwan", "secret1"),
        Err(LoginError::Disabled)
    ));
    assert_eq!(auth.current_session().unwrap(), None);
}

#[test]
fn provider_login_resolves_username_to_email() {
    let conn = open_db_in_memory().unwrap();
    let store = LocalStore::new(&conn);
    let provider = Arc::new(FakeProvider::default());
    let handle: Arc<dyn AuthProvider> = provider.clone();
    let mut accounts = AccountService::new(users(store), Some(handle.clone()));
    let account = accounts.signup(&signup("nimal", UserRole::Staff)).unwrap();
    assert_eq!(account.password_hash, None);

    let auth = AuthService::new(users(store), SessionStore::new(store), Some(handle));
    let session = auth.login("nimal", "secret1").unwrap();
    assert_eq!(session.email, "nimal@example.lk");
    assert_eq!(
        provider.sign_ins.lock().unwrap().as_slice(),
        ["nimal@example.lk".to_string()]
    );

    assert!(matches!(
        auth.login("nimal", "wrong1"),
        Err(LoginError::InvalidCredentials)
    ));
}

#[test]
fn unavailable_provider_falls_back_to_default_accounts() {
    let conn = open_db_in_memory().unwrap();
    let store = LocalStore::new(&conn);
    let provider: Arc<dyn AuthProvider> = Arc::new(FakeProvider {
        unavailable: true,
        ..FakeProvider::default()
    });

    let auth = AuthService::new(users(store), SessionStore::new(store), Some(provider));
    let session = auth.login("staff", "staff123").unwrap();
    assert_eq!(session.role, UserRole::Staff);
}

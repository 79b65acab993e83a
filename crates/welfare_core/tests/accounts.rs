use std::sync::Arc;
use welfare_core::model::user::SignupValidationIssue;
use welfare_core::service::account_service::{AccountError, AccountService};
use welfare_core::service::attachment_service::DeviceTrust;
use welfare_core::{
    hash_password, open_db_in_memory, InMemoryDocumentStore, LocalRepository, LocalStore,
    ManualClock, RemoteRepository, Session, SignupRequest, UserAccount, UserRole, UserStatus,
};

fn request(username: &str, role: Option<UserRole>) -> SignupRequest {
    SignupRequest {
        full_name: "Kamala Silva".to_string(),
        username: username.to_string(),
        email: format!("{username}@example.lk"),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
        role,
        organization: "Grama Niladhari Office".to_string(),
    }
}

fn admin() -> Session {
    Session {
        username: "admin".to_string(),
        role: UserRole::Admin,
        full_name: "Administrator".to_string(),
        email: String::new(),
    }
}

#[test]
fn staff_signup_is_active_and_stores_hash() {
    let conn = open_db_in_memory().unwrap();
    let repo = LocalRepository::<UserAccount>::new(
        LocalStore::new(&conn),
        Arc::new(ManualClock::new(2_000)),
    );
    let mut accounts = AccountService::new(repo, None);

    let account = accounts
        .signup(&request("kamala", Some(UserRole::Staff)))
        .unwrap();
    assert_eq!(account.id, "USER2000");
    assert_eq!(account.role, UserRole::Staff);
    assert_eq!(account.status, UserStatus::Active);
    assert_eq!(account.password_hash, Some(hash_password("secret1")));
    assert_eq!(accounts.users().len(), 1);
}

#[test]
fn signup_rejects_invalid_form_and_duplicate_username() {
    let conn = open_db_in_memory().unwrap();
    let repo = LocalRepository::<UserAccount>::new(
        LocalStore::new(&conn),
        Arc::new(ManualClock::new(2_000)),
    );
    let mut accounts = AccountService::new(repo, None);

    match accounts.signup(&request("kamala", None)) {
        Err(AccountError::Validation(err)) => {
            assert_eq!(err.issues, vec![SignupValidationIssue::MissingRole]);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    accounts
        .signup(&request("kamala", Some(UserRole::Staff)))
        .unwrap();
    assert!(matches!(
        accounts.signup(&request("kamala", Some(UserRole::Staff))),
        Err(AccountError::UsernameTaken(name)) if name == "kamala"
    ));
}

#[test]
fn built_in_usernames_cannot_be_registered() {
    let conn = open_db_in_memory().unwrap();
    let repo = LocalRepository::<UserAccount>::new(
        LocalStore::new(&conn),
        Arc::new(ManualClock::new(2_000)),
    );
    let mut accounts = AccountService::new(repo, None);

    assert!(matches!(
        accounts.signup(&request("admin", Some(UserRole::Staff))),
        Err(AccountError::UsernameTaken(name)) if name == "admin"
    ));
    assert!(matches!(
        accounts.signup(&request("Staff", Some(UserRole::Staff))),
        Err(AccountError::UsernameTaken(_))
    ));
    assert!(accounts.users().is_empty());

    let trust = DeviceTrust::new(LocalStore::new(&conn));
    trust.mark_trusted(2_000).unwrap();
    let impostor = Session {
        role: UserRole::Staff,
        ..admin()
    };
    assert!(!trust.can_modify(Some(&impostor)).unwrap());
    assert!(trust.can_modify(Some(&admin())).unwrap());
}

#[test]
fn admin_signup_waits_for_approval() {
    let conn = open_db_in_memory().unwrap();
    let repo = LocalRepository::<UserAccount>::new(
        LocalStore::new(&conn),
        Arc::new(ManualClock::new(2_000)),
    );
    let mut accounts = AccountService::new(repo, None);

    let pending = accounts
        .signup(&request("kamala", Some(UserRole::Admin)))
        .unwrap();
    assert_eq!(pending.role, UserRole::PendingAdmin);
    assert_eq!(pending.status, UserStatus::Pending);
    assert_eq!(accounts.pending_approvals().len(), 1);

    let approved = accounts.approve(&pending.id, &admin()).unwrap();
    assert_eq!(approved.role, UserRole::Admin);
    assert_eq!(approved.status, UserStatus::Active);
    assert_eq!(approved.approved_by.as_deref(), Some("admin"));
    assert!(accounts.pending_approvals().is_empty());

    assert!(matches!(
        accounts.approve(&pending.id, &admin()),
        Err(AccountError::InvalidTransition { .. })
    ));
}

#[test]
fn reject_removes_pending_account() {
    let store = InMemoryDocumentStore::new();
    let repo = RemoteRepository::<UserAccount, _>::new(&store, Arc::new(ManualClock::new(1)));
    let mut accounts = AccountService::new(repo, None);

    let pending = accounts
        .signup(&request("kamala", Some(UserRole::Admin)))
        .unwrap();
    accounts.reject(&pending.id, &admin()).unwrap();
    assert!(accounts.users().is_empty());
    assert!(matches!(
        accounts.reject(&pending.id, &admin()),
        Err(AccountError::NotFound(_))
    ));
}

#[test]
fn admin_cannot_modify_own_account() {
    let conn = open_db_in_memory().unwrap();
    let repo = LocalRepository::<UserAccount>::new(
        LocalStore::new(&conn),
        Arc::new(ManualClock::new(2_000)),
    );
    let mut accounts = AccountService::new(repo, None);
    let own = accounts
        .signup(&request("kamala", Some(UserRole::Staff)))
        .unwrap();
    let actor = Session {
        username: "kamala".to_string(),
        ..admin()
    };

    assert!(matches!(
        accounts.set_status(&own.id, UserStatus::Disabled, &actor),
        Err(AccountError::SelfModification)
    ));
    assert!(matches!(
        accounts.delete_user(&own.id, &actor),
        Err(AccountError::SelfModification)
    ));
}

#[test]
fn status_toggle_and_delete_require_admin() {
    let conn = open_db_in_memory().unwrap();
    let repo = LocalRepository::<UserAccount>::new(
        LocalStore::new(&conn),
        Arc::new(ManualClock::new(2_000)),
    );
    let mut accounts = AccountService::new(repo, None);
    let account = accounts
        .signup(&request("ruwan", Some(UserRole::Staff)))
        .unwrap();
    let staff = Session {
        username: "staff".to_string(),
        role: UserRole::Staff,
        ..admin()
    };

    assert!(matches!(
        accounts.set_status(&account.id, UserStatus::Disabled, &staff),
        Err(AccountError::Forbidden)
    ));

    let disabled = accounts
        .set_status(&account.id, UserStatus::Disabled, &admin())
        .unwrap();
    assert_eq!(disabled.status, UserStatus::Disabled);
    assert_eq!(disabled.updated_by.as_deref(), Some("admin"));
    assert!(matches!(
        accounts.set_status(&account.id, UserStatus::Pending, &admin()),
        Err(AccountError::InvalidTransition { .. })
    ));

    accounts
        .set_status(&account.id, UserStatus::Active, &admin())
        .unwrap();
    accounts.delete_user(&account.id, &admin()).unwrap();
    assert!(accounts.users().is_empty());
}

#[test]
fn search_users_matches_name_email_and_organization() {
    let conn = open_db_in_memory().unwrap();
    let repo = LocalRepository::<UserAccount>::new(
        LocalStore::new(&conn),
        Arc::new(ManualClock::new(2_000)),
    );
    let mut accounts = AccountService::new(repo, None);
    accounts
        .signup(&request("kamala", Some(UserRole::Staff)))
        .unwrap();
    accounts
        .signup(&SignupRequest {
            full_name: "Ruwan Fernando".to_string(),
            organization: "Samurdhi Office".to_string(),
            ..request("ruwan", Some(UserRole::Staff))
        })
        .unwrap();

    assert_eq!(accounts.search_users("").len(), 2);
    assert_eq!(accounts.search_users("SAMURDHI").len(), 1);
    assert_eq!(accounts.search_users("kamala@").len(), 1);
    assert!(accounts.search_users("nobody").is_empty());
}

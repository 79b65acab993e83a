use serde_json::{Map, Value};
use std::sync::Arc;
use welfare_core::model::family::FamilyStatus;
use welfare_core::store::{Document, DocumentStore, StoreError, StoreResult};
use welfare_core::{
    open_db_in_memory, BackendKind, FamilyDraft, FamilyInfo, FamilyPatch, FamilyRecord,
    InMemoryDocumentStore, LocalRepository, LocalStore, ManualClock, RemoteRepository, RepoError,
    Repository,
};

fn draft(name: &str, city: &str) -> FamilyDraft {
    FamilyDraft::new(FamilyInfo {
        family_name: name.to_string(),
        address: "12 Lake Rd".to_string(),
        city: city.to_string(),
        contact_number: "0771234567".to_string(),
        number_of_members: 4,
        ..FamilyInfo::default()
    })
}

fn exercise_crud(repo: &dyn Repository<FamilyRecord>, clock: &ManualClock) {
    let silva = repo.add(draft("Silva", "Kandy")).unwrap();
    clock.advance_ms(10);
    let perera = repo.add(draft("Perera", "Galle")).unwrap();
    assert_ne!(silva.id, perera.id);
    assert_eq!(silva.created_at, silva.updated_at);

    clock.advance_ms(10);
    let updated = repo
        .update(&silva.id, &FamilyPatch::status(FamilyStatus::Inactive))
        .unwrap();
    assert_eq!(updated.status, FamilyStatus::Inactive);
    assert_eq!(updated.created_at, silva.created_at);
    assert!(updated.updated_at > silva.updated_at);

    let hits = repo.search("KAND").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, silva.id);
    assert_eq!(repo.search("").unwrap().len(), 2);

    repo.delete(&perera.id).unwrap();
    assert!(repo.get(&perera.id).unwrap().is_none());
    assert!(matches!(
        repo.delete(&perera.id),
        Err(RepoError::NotFound { .. })
    ));
    assert!(repo
        .update(&perera.id, &FamilyPatch::default())
        .unwrap_err()
        .is_not_found());

    repo.add_with_id(&perera).unwrap();
    let restored = repo.get(&perera.id).unwrap().unwrap();
    assert_eq!(restored, perera);
    assert!(matches!(
        repo.add_with_id(&perera),
        Err(RepoError::DuplicateId { .. })
    ));
}

#[test]
fn local_repository_crud_and_search() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let repo = LocalRepository::<FamilyRecord>::new(LocalStore::new(&conn), clock.clone());
    assert_eq!(repo.backend(), BackendKind::Local);
    exercise_crud(&repo, &clock);
}

#[test]
fn remote_repository_crud_and_search() {
    let store = InMemoryDocumentStore::new();
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let repo = RemoteRepository::<FamilyRecord, _>::new(&store, clock.clone());
    assert_eq!(repo.backend(), BackendKind::Remote);
    exercise_crud(&repo, &clock);
}

#[test]
fn local_ids_bump_on_same_millisecond() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(5_000));
    let repo = LocalRepository::<FamilyRecord>::new(LocalStore::new(&conn), clock);

    let first = repo.add(draft("Silva", "Kandy")).unwrap();
    let second = repo.add(draft("Perera", "Galle")).unwrap();
    assert_eq!(first.id, "FAM5000");
    assert_eq!(second.id, "FAM5001");
}

#[test]
fn local_collection_is_stored_as_json_array() {
    let conn = open_db_in_memory().unwrap();
    let store = LocalStore::new(&conn);
    let repo = LocalRepository::<FamilyRecord>::new(store, Arc::new(ManualClock::new(1)));
    repo.add(draft("Silva", "Kandy")).unwrap();

    let raw = store.get_item("familiesData").unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value[0]["familyInfo"]["familyName"], "Silva");
    assert_eq!(value[0]["id"], "FAM1");
    assert_eq!(value[0]["status"], "active");
}

#[test]
fn remote_get_all_lists_newest_first() {
    let store = InMemoryDocumentStore::new();
    let clock = Arc::new(ManualClock::new(100));
    let repo = RemoteRepository::<FamilyRecord, _>::new(&store, clock.clone());

    repo.add(draft("Older", "Kandy")).unwrap();
    clock.advance_ms(50);
    repo.add(draft("Newer", "Kandy")).unwrap();

    let names = repo
        .get_all()
        .unwrap()
        .into_iter()
        .map(|family| family.family_info.family_name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Newer".to_string(), "Older".to_string()]);
}

#[test]
fn replace_all_discards_previous_records() {
    let conn = open_db_in_memory().unwrap();
    let repo = LocalRepository::<FamilyRecord>::new(
        LocalStore::new(&conn),
        Arc::new(ManualClock::new(1)),
    );
    let kept = repo.add(draft("Silva", "Kandy")).unwrap();
    repo.add(draft("Perera", "Galle")).unwrap();

    repo.replace_all(std::slice::from_ref(&kept)).unwrap();
    assert_eq!(repo.get_all().unwrap(), vec![kept]);
}

/// Document store that refuses to clear collections.
struct ClearRefusingStore(InMemoryDocumentStore);

impl DocumentStore for ClearRefusingStore {
    fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        self.0.list(collection)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.0.get(collection, id)
    }

    fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<String> {
        self.0.insert(collection, data)
    }

    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> StoreResult<()> {
        self.0.set(collection, id, data)
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.0.delete(collection, id)
    }

    fn clear(&self, _collection: &str) -> StoreResult<()> {
        Err(StoreError::Backend("permission denied".to_string()))
    }
}

#[test]
fn remote_replace_all_writes_nothing_when_clear_fails() {
    let store = ClearRefusingStore(InMemoryDocumentStore::new());
    let clock = Arc::new(ManualClock::new(100));
    let repo = RemoteRepository::<FamilyRecord, _>::new(&store, clock.clone());
    let existing = repo.add(draft("Silva", "Kandy")).unwrap();

    clock.advance_ms(10);
    let mut incoming = existing.clone();
    incoming.id = "FAM999".to_string();
    incoming.family_info.family_name = "Perera".to_string();

    assert!(matches!(
        repo.replace_all(&[incoming]),
        Err(RepoError::Store(StoreError::Backend(_)))
    ));
    assert_eq!(repo.get_all().unwrap(), vec![existing]);
}

//! Integration tests for the local persistence unit over the JSON audit file.

use std::collections::HashSet;
use std::sync::Arc;

use user_store::{
    AuditTrail, InMemoryUserStore, JsonFileAuditTrail, LocalPersistenceUnit, User, UserId,
    UserStore,
};

async fn setup(
    dir: &tempfile::TempDir,
) -> (
    LocalPersistenceUnit<InMemoryUserStore>,
    InMemoryUserStore,
    Arc<JsonFileAuditTrail>,
) {
    let store = InMemoryUserStore::new();
    let audit = Arc::new(
        JsonFileAuditTrail::open(dir.path().join("data/users.json"))
            .await
            .unwrap(),
    );
    let unit = LocalPersistenceUnit::new(store.clone()).with_audit(audit.clone());
    (unit, store, audit)
}

#[tokio::test]
async fn audit_sequence_matches_store_after_inserts_and_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let (unit, store, audit) = setup(&dir).await;

    let mut ids = Vec::new();
    for i in 0..6 {
        let user = User::new(format!("user{i}@x.com"), "First", "Last");
        ids.push(user.id);
        assert!(unit.insert(user).await.is_success());
    }
    for id in ids.iter().step_by(2) {
        assert!(unit.delete(*id).await.is_success());
    }

    let in_audit: HashSet<UserId> = audit.read_all().await.unwrap().iter().map(|u| u.id).collect();
    let in_store: HashSet<UserId> = store.list().await.unwrap().iter().map(|u| u.id).collect();

    assert_eq!(in_store.len(), 3);
    assert_eq!(in_audit, in_store);
}

#[tokio::test]
async fn audit_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let user = User::new("a@x.com", "Ada", "Lovelace");
    {
        let (unit, _, _) = setup(&dir).await;
        assert!(unit.insert(user.clone()).await.is_success());
    }

    let reopened = JsonFileAuditTrail::open(dir.path().join("data/users.json"))
        .await
        .unwrap();
    assert_eq!(reopened.read_all().await.unwrap(), vec![user]);
}

#[tokio::test]
async fn concurrent_inserts_with_same_email_commit_at_most_once() {
    let dir = tempfile::tempdir().unwrap();
    let (unit, store, audit) = setup(&dir).await;
    let unit = Arc::new(unit);

    let mut handles = Vec::new();
    for i in 0..8 {
        let unit = unit.clone();
        handles.push(tokio::spawn(async move {
            unit.insert(User::new("same@x.com", format!("Racer{i}"), "Last"))
                .await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        if handle.await.unwrap().is_success() {
            committed += 1;
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(store.user_count().await, 1);
    assert_eq!(audit.read_all().await.unwrap().len(), 1);
}

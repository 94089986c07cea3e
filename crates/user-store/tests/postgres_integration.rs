//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p user-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use user_store::{
    InMemoryAuditTrail, LocalPersistenceUnit, PostgresUserStore, UnitOfWork, User,
    UserStore, UserStoreError,
};

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_users_table.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresUserStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE users")
        .execute(&pool)
        .await
        .unwrap();

    PostgresUserStore::new(pool)
}

#[tokio::test]
#[serial]
async fn insert_commit_and_lookup() {
    let store = get_test_store().await;
    let user = User::new("a@x.com", "Ada", "Lovelace");

    let mut uow = store.begin().await.unwrap();
    uow.insert(&user).await.unwrap();
    uow.commit().await.unwrap();

    assert_eq!(store.get(user.id).await.unwrap(), Some(user.clone()));
    assert_eq!(
        store.find_by_email("a@x.com").await.unwrap(),
        Some(user.clone())
    );
    assert!(store.is_email_taken("a@x.com").await.unwrap());
    assert!(!store.is_email_taken("b@x.com").await.unwrap());
}

#[tokio::test]
#[serial]
async fn rollback_discards_insert() {
    let store = get_test_store().await;
    let user = User::new("a@x.com", "Ada", "Lovelace");

    let mut uow = store.begin().await.unwrap();
    uow.insert(&user).await.unwrap();
    uow.rollback().await.unwrap();

    assert!(store.get(user.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn unique_constraint_maps_to_duplicate_email() {
    let store = get_test_store().await;

    let mut uow = store.begin().await.unwrap();
    uow.insert(&User::new("a@x.com", "Ada", "Lovelace"))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let err = uow
        .insert(&User::new("a@x.com", "Other", "Person"))
        .await
        .unwrap_err();
    assert!(matches!(err, UserStoreError::DuplicateEmail(ref e) if e == "a@x.com"));
}

#[tokio::test]
#[serial]
async fn audit_failure_rolls_back_postgres_insert() {
    let store = get_test_store().await;
    let audit = InMemoryAuditTrail::new();
    audit.set_fail_on_append(true);
    let unit = LocalPersistenceUnit::new(store.clone()).with_audit(Arc::new(audit));
    let user = User::new("a@x.com", "Ada", "Lovelace");

    let result = unit.insert(user.clone()).await;

    assert!(!result.is_success());
    assert!(store.get(user.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn delete_twice_reports_not_found() {
    let store = get_test_store().await;
    let unit = LocalPersistenceUnit::new(store.clone());
    let user = User::new("a@x.com", "Ada", "Lovelace");
    assert!(unit.insert(user.clone()).await.is_success());

    assert!(unit.delete(user.id).await.is_success());
    let second = unit.delete(user.id).await;
    assert!(!second.is_success());
    assert!(second.message().contains("not found"));
}

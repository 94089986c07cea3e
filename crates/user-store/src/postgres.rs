use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, User, UserId, UserStoreError,
    store::{UnitOfWork, UserStore},
};

/// Name of the uniqueness constraint on `users.email`.
const EMAIL_CONSTRAINT: &str = "users_email_key";

/// PostgreSQL-backed user store.
#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Creates a new PostgreSQL user store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store over a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
        })
    }
}

fn map_write_error(e: sqlx::Error, email: &str) -> UserStoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.constraint() == Some(EMAIL_CONSTRAINT)
    {
        return UserStoreError::DuplicateEmail(email.to_string());
    }
    UserStoreError::Database(e)
}

#[async_trait]
impl UserStore for PostgresUserStore {
    type UnitOfWork = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork { tx })
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, first_name, last_name FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row =
            sqlx::query("SELECT id, email, first_name, last_name FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn list(&self) -> Result<Vec<User>> {
        let rows =
            sqlx::query("SELECT id, email, first_name, last_name FROM users ORDER BY email ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Self::row_to_user).collect()
    }

    async fn is_email_taken(&self, email: &str) -> Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(taken)
    }
}

/// Unit of work backed by a PostgreSQL transaction.
///
/// Dropping it without committing rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert(&mut self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, &user.email))?;
        Ok(())
    }

    async fn update(&mut self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET email = $2, first_name = $3, last_name = $4
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, &user.email))?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::NotFound(user.id));
        }
        Ok(())
    }

    async fn remove(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "DELETE FROM users WHERE id = $1 RETURNING id, email, first_name, last_name",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(PostgresUserStore::row_to_user).transpose()
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

use async_trait::async_trait;

use crate::{Result, User, UserId};

/// A scoped unit of work against the primary store.
///
/// Writes made through the unit are only visible to other callers once
/// [`commit`](UnitOfWork::commit) succeeds. Dropping an uncommitted unit
/// rolls it back, so every exit path releases it.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Inserts a new record.
    ///
    /// Fails with `DuplicateEmail` when the email is already in use.
    async fn insert(&mut self, user: &User) -> Result<()>;

    /// Replaces an existing record, failing with `NotFound` if absent.
    async fn update(&mut self, user: &User) -> Result<()>;

    /// Removes a record, returning it if it existed.
    async fn remove(&mut self, id: UserId) -> Result<Option<User>>;

    /// Makes all writes of this unit durable.
    async fn commit(self) -> Result<()>;

    /// Discards all writes of this unit.
    async fn rollback(self) -> Result<()>;
}

/// Core trait for primary store implementations.
///
/// All implementations must be thread-safe (Send + Sync) and must enforce
/// email uniqueness themselves: callers check uniqueness before inserting,
/// but that check is not atomic with the insert.
#[async_trait]
pub trait UserStore: Send + Sync {
    type UnitOfWork: UnitOfWork;

    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Self::UnitOfWork>;

    /// Looks a record up by ID.
    async fn get(&self, id: UserId) -> Result<Option<User>>;

    /// Looks a record up by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Returns all committed records.
    async fn list(&self) -> Result<Vec<User>>;

    /// Returns true if a committed record already uses `email`.
    async fn is_email_taken(&self, email: &str) -> Result<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }
}

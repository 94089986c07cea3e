//! Local persistence for user records.
//!
//! - [`UserStore`] / [`UnitOfWork`]: the primary store and its scoped transactions
//! - [`AuditTrail`]: the denormalized JSON copy of every committed user
//! - [`LocalPersistenceUnit`]: store write and audit write committed as one unit

pub mod audit;
pub mod error;
pub mod memory;
pub mod persistence;
pub mod postgres;
pub mod store;
pub mod user;

pub use audit::{AuditError, AuditTrail, InMemoryAuditTrail, JsonFileAuditTrail};
pub use common::UserId;
pub use error::{Result, UserStoreError};
pub use memory::{InMemoryUnitOfWork, InMemoryUserStore};
pub use persistence::LocalPersistenceUnit;
pub use postgres::{PgUnitOfWork, PostgresUserStore};
pub use store::{UnitOfWork, UserStore};
pub use user::User;

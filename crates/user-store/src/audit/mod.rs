//! The audit trail: a denormalized copy of every committed user record.
//!
//! Read in full, the trail is expected to equal the set of committed
//! records. That is best-effort only; a crash between the store commit and
//! the audit write can leave them apart.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::{User, UserId};

pub use file::JsonFileAuditTrail;
pub use memory::InMemoryAuditTrail;

/// Errors raised while reading or writing the audit trail.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit file could not be read.
    #[error("Error reading JSON file: {0}")]
    Read(std::io::Error),

    /// The audit file could not be created or written.
    #[error("Error saving data to JSON file: {0}")]
    Io(#[from] std::io::Error),

    /// The audit sequence could not be serialized.
    #[error("Error saving data to JSON file: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing sink rejected the write.
    #[error("Error saving data to JSON file: {0}")]
    Rejected(String),
}

/// Trait for audit trail storage.
#[async_trait]
pub trait AuditTrail: Send + Sync {
    /// Appends a snapshot of `user`.
    async fn append(&self, user: &User) -> Result<(), AuditError>;

    /// Replaces the snapshot with the same ID. Returns false if none existed.
    async fn replace(&self, user: &User) -> Result<bool, AuditError>;

    /// Removes the snapshot with `id`. Returns false if none existed.
    async fn remove(&self, id: UserId) -> Result<bool, AuditError>;

    /// Reads the whole sequence.
    async fn read_all(&self) -> Result<Vec<User>, AuditError>;
}

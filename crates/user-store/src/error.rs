use thiserror::Error;

use crate::UserId;
use crate::audit::AuditError;

/// Errors that can occur when reading or writing user records.
#[derive(Debug, Error)]
pub enum UserStoreError {
    /// Another record already uses this email (store uniqueness constraint).
    #[error("Email {0} already exists.")]
    DuplicateEmail(String),

    /// No record exists with the given ID.
    #[error("User with Id '{0}' not found.")]
    NotFound(UserId),

    /// The audit trail could not be updated.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for user store operations.
pub type Result<T> = std::result::Result<T, UserStoreError>;

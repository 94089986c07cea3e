//! The user record owned by the local persistence unit.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// A committed user record.
///
/// The same shape is written to the audit trail, so the serde field names
/// are part of the audit file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    /// Creates a user with a freshly generated ID.
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

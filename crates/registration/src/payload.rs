//! The payload sent to downstream services.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};
use user_store::User;

/// Registration notice sent verbatim to every downstream endpoint.
///
/// Built once per registration attempt and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// When the saga started notifying.
    pub registered_at: DateTime<Utc>,
    /// How long the local insert took.
    pub persist_elapsed_ms: u64,
}

impl NotificationPayload {
    pub fn build(user: &User, registered_at: DateTime<Utc>, persist_elapsed: Duration) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            registered_at,
            persist_elapsed_ms: u64::try_from(persist_elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

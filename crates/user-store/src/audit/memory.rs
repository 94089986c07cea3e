//! In-memory audit trail with fault injection, for tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{AuditError, AuditTrail};
use crate::{User, UserId};

#[derive(Debug, Default)]
struct InMemoryAuditState {
    entries: Vec<User>,
    fail_on_append: bool,
    fail_on_remove: bool,
}

/// In-memory audit trail.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditTrail {
    state: Arc<Mutex<InMemoryAuditState>>,
}

impl InMemoryAuditTrail {
    /// Creates a new empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryAuditState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the trail to reject appends.
    pub fn set_fail_on_append(&self, fail: bool) {
        self.state().fail_on_append = fail;
    }

    /// Configures the trail to reject removals.
    pub fn set_fail_on_remove(&self, fail: bool) {
        self.state().fail_on_remove = fail;
    }

    /// Returns the number of entries.
    pub fn entry_count(&self) -> usize {
        self.state().entries.len()
    }

    /// Returns true if an entry exists for `id`.
    pub fn contains(&self, id: UserId) -> bool {
        self.state().entries.iter().any(|u| u.id == id)
    }
}

#[async_trait]
impl AuditTrail for InMemoryAuditTrail {
    async fn append(&self, user: &User) -> Result<(), AuditError> {
        let mut state = self.state();
        if state.fail_on_append {
            return Err(AuditError::Rejected("disk full".to_string()));
        }
        state.entries.push(user.clone());
        Ok(())
    }

    async fn replace(&self, user: &User) -> Result<bool, AuditError> {
        let mut state = self.state();
        match state.entries.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: UserId) -> Result<bool, AuditError> {
        let mut state = self.state();
        if state.fail_on_remove {
            return Err(AuditError::Rejected("disk full".to_string()));
        }
        let before = state.entries.len();
        state.entries.retain(|u| u.id != id);
        Ok(state.entries.len() != before)
    }

    async fn read_all(&self) -> Result<Vec<User>, AuditError> {
        Ok(self.state().entries.clone())
    }
}

//! Store write and audit write handled as one logical unit.

use std::sync::Arc;

use common::ApiResponse;

use crate::{AuditTrail, Result, User, UserId, UserStore, UserStoreError, store::UnitOfWork};

pub const USER_INSERTED: &str = "User inserted successfully.";
pub const USER_UPDATED: &str = "User updated successfully.";
pub const USER_DELETED: &str = "User deleted successfully.";

/// Wraps the primary store and the optional audit trail.
///
/// Each mutation opens a unit of work, writes the store, then writes the
/// audit trail. The unit only commits when both writes succeed; an audit
/// failure rolls the store write back and is reported as the failure.
pub struct LocalPersistenceUnit<S: UserStore> {
    store: S,
    audit: Option<Arc<dyn AuditTrail>>,
}

impl<S: UserStore> LocalPersistenceUnit<S> {
    /// Creates a persistence unit without an audit trail.
    pub fn new(store: S) -> Self {
        Self { store, audit: None }
    }

    /// Attaches an audit trail.
    pub fn with_audit(mut self, audit: Arc<dyn AuditTrail>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Returns a reference to the primary store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Inserts `user` into the store and the audit trail.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn insert(&self, user: User) -> ApiResponse<User> {
        match self.try_insert(&user).await {
            Ok(()) => {
                metrics::counter!("local_inserts_total").increment(1);
                ApiResponse::ok(user, USER_INSERTED)
            }
            Err(e) => {
                metrics::counter!("local_insert_failures_total").increment(1);
                tracing::warn!(error = %e, "local insert failed");
                ApiResponse::fail(e.to_string())
            }
        }
    }

    /// Removes the record with `id` from the store and the audit trail.
    ///
    /// A missing record is a failure, so calling this twice for the same ID
    /// reports "not found" the second time and changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: UserId) -> ApiResponse<bool> {
        match self.try_delete(id).await {
            Ok(()) => ApiResponse::ok(true, USER_DELETED),
            Err(e) => {
                tracing::warn!(error = %e, "local delete failed");
                ApiResponse::fail(e.to_string())
            }
        }
    }

    /// Replaces an existing record in the store and the audit trail.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn update(&self, user: User) -> ApiResponse<User> {
        match self.try_update(&user).await {
            Ok(()) => ApiResponse::ok(user, USER_UPDATED),
            Err(e) => {
                tracing::warn!(error = %e, "local update failed");
                ApiResponse::fail(e.to_string())
            }
        }
    }

    async fn try_insert(&self, user: &User) -> Result<()> {
        let mut uow = self.store.begin().await?;
        uow.insert(user).await?;

        if let Some(audit) = &self.audit
            && let Err(e) = audit.append(user).await
        {
            roll_back(uow).await;
            return Err(e.into());
        }

        if let Err(e) = uow.commit().await {
            if let Some(audit) = &self.audit {
                self.forget_audit_entry(audit.as_ref(), user.id).await;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn try_delete(&self, id: UserId) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let Some(removed) = uow.remove(id).await? else {
            return Err(UserStoreError::NotFound(id));
        };

        if let Some(audit) = &self.audit {
            match audit.remove(id).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(%id, "no audit entry for deleted user"),
                Err(e) => {
                    roll_back(uow).await;
                    return Err(e.into());
                }
            }
        }

        if let Err(e) = uow.commit().await {
            if let Some(audit) = &self.audit
                && let Err(restore_err) = audit.append(&removed).await
            {
                tracing::error!(%id, error = %restore_err, "failed to restore audit entry");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn try_update(&self, user: &User) -> Result<()> {
        let mut uow = self.store.begin().await?;
        uow.update(user).await?;

        if let Some(audit) = &self.audit {
            match audit.replace(user).await {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(e) = audit.append(user).await {
                        roll_back(uow).await;
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    roll_back(uow).await;
                    return Err(e.into());
                }
            }
        }

        uow.commit().await
    }

    async fn forget_audit_entry(&self, audit: &dyn AuditTrail, id: UserId) {
        if let Err(e) = audit.remove(id).await {
            tracing::error!(%id, error = %e, "failed to drop audit entry after commit failure");
        }
    }
}

async fn roll_back<U: UnitOfWork>(uow: U) {
    if let Err(e) = uow.rollback().await {
        tracing::error!(error = %e, "rollback failed");
    }
}

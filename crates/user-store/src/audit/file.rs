//! JSON file audit trail.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{AuditError, AuditTrail};
use crate::{User, UserId};

/// Audit trail stored as one pretty-printed JSON array.
///
/// Every mutation loads the full sequence, changes it and writes the whole
/// file back. Mutations from this process are serialized; concurrent
/// writers in other processes are not coordinated.
#[derive(Debug)]
pub struct JsonFileAuditTrail {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileAuditTrail {
    /// Opens the trail at `path`, creating missing directories and an empty file.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let trail = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };
        trail.ensure_exists().await?;
        Ok(trail)
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_exists(&self) -> Result<(), AuditError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !tokio::fs::try_exists(&self.path).await? {
            tokio::fs::write(&self.path, b"").await?;
        }
        Ok(())
    }

    /// Loads the sequence. Empty or malformed content reads as empty.
    async fn load(&self) -> Result<Vec<User>, AuditError> {
        self.ensure_exists().await?;
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(AuditError::Read)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&content) {
            Ok(users) => Ok(users),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "malformed audit file, treating it as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, users: &[User]) -> Result<(), AuditError> {
        let json = serde_json::to_vec_pretty(users)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl AuditTrail for JsonFileAuditTrail {
    async fn append(&self, user: &User) -> Result<(), AuditError> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load().await?;
        users.push(user.clone());
        self.save(&users).await
    }

    async fn replace(&self, user: &User) -> Result<bool, AuditError> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load().await?;
        let Some(slot) = users.iter_mut().find(|u| u.id == user.id) else {
            return Ok(false);
        };
        *slot = user.clone();
        self.save(&users).await?;
        Ok(true)
    }

    async fn remove(&self, id: UserId) -> Result<bool, AuditError> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load().await?;
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Ok(false);
        }
        self.save(&users).await?;
        Ok(true)
    }

    async fn read_all(&self) -> Result<Vec<User>, AuditError> {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, User, UserId, UserStoreError,
    store::{UnitOfWork, UserStore},
};

type UserTable = HashMap<UserId, User>;

/// In-memory user store for testing and for running without a database.
///
/// A unit of work holds the table lock until it commits or rolls back, which
/// serializes writers the same way a row-locking database would for
/// conflicting inserts.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<Mutex<UserTable>>,
}

impl InMemoryUserStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed records.
    pub async fn user_count(&self) -> usize {
        self.users.lock().await.len()
    }
}

fn email_in_use(table: &UserTable, email: &str, except: Option<UserId>) -> bool {
    table
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    type UnitOfWork = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork> {
        let guard = self.users.clone().lock_owned().await;
        Ok(InMemoryUnitOfWork {
            table: guard,
            undo: Vec::new(),
            finished: false,
        })
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let table = self.users.lock().await;
        Ok(table.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<User>> {
        let table = self.users.lock().await;
        let mut users: Vec<User> = table.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }
}

enum Undo {
    Inserted(UserId),
    Replaced(User),
    Removed(User),
}

/// Unit of work over [`InMemoryUserStore`].
///
/// Writes are applied to the table immediately and journaled; rollback (or
/// drop without commit) replays the journal backwards.
pub struct InMemoryUnitOfWork {
    table: OwnedMutexGuard<UserTable>,
    undo: Vec<Undo>,
    finished: bool,
}

impl InMemoryUnitOfWork {
    fn revert(&mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Inserted(id) => {
                    self.table.remove(&id);
                }
                Undo::Replaced(previous) | Undo::Removed(previous) => {
                    self.table.insert(previous.id, previous);
                }
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn insert(&mut self, user: &User) -> Result<()> {
        if email_in_use(&self.table, &user.email, None) || self.table.contains_key(&user.id) {
            return Err(UserStoreError::DuplicateEmail(user.email.clone()));
        }
        self.table.insert(user.id, user.clone());
        self.undo.push(Undo::Inserted(user.id));
        Ok(())
    }

    async fn update(&mut self, user: &User) -> Result<()> {
        if !self.table.contains_key(&user.id) {
            return Err(UserStoreError::NotFound(user.id));
        }
        if email_in_use(&self.table, &user.email, Some(user.id)) {
            return Err(UserStoreError::DuplicateEmail(user.email.clone()));
        }
        if let Some(previous) = self.table.insert(user.id, user.clone()) {
            self.undo.push(Undo::Replaced(previous));
        }
        Ok(())
    }

    async fn remove(&mut self, id: UserId) -> Result<Option<User>> {
        let removed = self.table.remove(&id);
        if let Some(ref user) = removed {
            self.undo.push(Undo::Removed(user.clone()));
        }
        Ok(removed)
    }

    async fn commit(mut self) -> Result<()> {
        self.undo.clear();
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.revert();
        self.finished = true;
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            self.revert();
        }
    }
}

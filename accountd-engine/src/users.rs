//! Credential store over fjall partitions
//!
//! Two partitions back the store: `users` maps an id to the JSON-encoded
//! record and `user_emails` maps a normalized email to the owning id. Both
//! are always written in one keyspace batch.

use crate::{backend, StorageEngine};
use accountd_core::{CredentialStore, Email, NewUser, StoreError, StoreResult, User, UserChanges, UserId};
use fjall::PartitionHandle;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const USERS_PARTITION: &str = "users";
const EMAILS_PARTITION: &str = "user_emails";

/// Persistent [`CredentialStore`].
///
/// Writers are serialized so the email-uniqueness check and the write that
/// relies on it cannot interleave with another writer.
pub struct FjallCredentialStore {
    engine: StorageEngine,
    users: PartitionHandle,
    emails: PartitionHandle,
    write_lock: Mutex<()>,
}

impl FjallCredentialStore {
    /// Open (or create) the user partitions
    pub fn open(engine: StorageEngine) -> StoreResult<Self> {
        let users = engine.partition(USERS_PARTITION)?;
        let emails = engine.partition(EMAILS_PARTITION)?;

        Ok(FjallCredentialStore {
            engine,
            users,
            emails,
            write_lock: Mutex::new(()),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Backend("credential store write lock poisoned".to_string()))
    }

    fn get_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        match self.users.get(user_key(id)).map_err(backend)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn email_owner(&self, email: &Email) -> StoreResult<Option<UserId>> {
        match self.emails.get(email.as_str()).map_err(backend)? {
            Some(bytes) => {
                let id = std::str::from_utf8(&bytes)
                    .map_err(backend)
                    .and_then(|s| UserId::parse(s).map_err(backend))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Write the record (and optionally move its email index entry) atomically
    fn write_user(&self, user: &User, replaced_email: Option<&Email>) -> StoreResult<()> {
        let encoded = serde_json::to_vec(user)?;

        let mut batch = self.engine.keyspace().batch();
        batch.insert(&self.users, user_key(&user.id), encoded);
        if let Some(old) = replaced_email {
            batch.remove(&self.emails, old.as_str());
        }
        batch.insert(&self.emails, user.email.as_str(), user_key(&user.id));
        batch.commit().map_err(backend)?;

        self.engine.persist()
    }
}

impl CredentialStore for FjallCredentialStore {
    fn create(&self, new_user: NewUser) -> StoreResult<User> {
        let _guard = self.lock()?;

        if self.email_owner(&new_user.email)?.is_some() {
            debug!("Create rejected: email {} already indexed", new_user.email);
            return Err(StoreError::email_conflict());
        }

        let user = User::from_new(new_user);
        self.write_user(&user, None)?;
        Ok(user)
    }

    fn find_by_email(&self, email: &Email) -> StoreResult<Option<User>> {
        match self.email_owner(email)? {
            Some(id) => self.get_user(&id),
            None => Ok(None),
        }
    }

    fn find_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        self.get_user(id)
    }

    fn update(&self, id: &UserId, changes: UserChanges) -> StoreResult<User> {
        let _guard = self.lock()?;

        let mut user = self
            .get_user(id)?
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if let Some(email) = &changes.email {
            if self.email_owner(email)?.is_some_and(|owner| owner != *id) {
                debug!("Update rejected: email {} already indexed", email);
                return Err(StoreError::email_conflict());
            }
        }

        let old_email = user.email.clone();
        user.apply(changes);
        let replaced = (user.email != old_email).then_some(&old_email);
        self.write_user(&user, replaced)?;
        Ok(user)
    }

    fn delete(&self, id: &UserId) -> StoreResult<User> {
        let _guard = self.lock()?;

        let user = self
            .get_user(id)?
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        let mut batch = self.engine.keyspace().batch();
        batch.remove(&self.users, user_key(id));
        batch.remove(&self.emails, user.email.as_str());
        batch.commit().map_err(backend)?;
        self.engine.persist()?;

        Ok(user)
    }

    fn list_all(&self) -> StoreResult<Vec<User>> {
        let mut users = Vec::new();
        for item in self.users.iter() {
            let (_key, value) = item.map_err(|e| StoreError::Backend(format!("scan error: {}", e)))?;
            users.push(serde_json::from_slice(&value)?);
        }
        Ok(users)
    }
}

fn user_key(id: &UserId) -> String {
    id.to_string()
}

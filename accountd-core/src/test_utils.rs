//! Test utilities and infrastructure for accountd testing

use crate::auth::{PasswordHasher, TokenConfig, TokenIssuer};
use crate::{
    AccountService, CredentialStore, Email, NewUser, Principal, PublicUser, StoreError, StoreResult, User,
    UserChanges, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Fixed signing secret for tests
pub const TEST_SECRET: &[u8] = b"accountd-test-secret-0123456789abcdef";

/// Hasher with the smallest legal Argon2id costs, so tests stay fast
pub fn fast_hasher() -> PasswordHasher {
    PasswordHasher::with_params(8, 1, 1).expect("minimal argon2 params are valid")
}

pub fn test_issuer() -> TokenIssuer {
    TokenIssuer::new(TEST_SECRET, TokenConfig::default()).expect("test secret is long enough")
}

/// Service over a fresh in-memory store
pub fn test_service() -> AccountService {
    service_with_store(Arc::new(MemoryCredentialStore::new()))
}

pub fn service_with_store(store: Arc<dyn CredentialStore>) -> AccountService {
    AccountService::new(store, fast_hasher(), test_issuer())
}

/// Principal for a user returned by the service
pub fn admin_principal(user: &PublicUser) -> Principal {
    Principal {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    }
}

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    emails: HashMap<Email, UserId>,
}

/// In-memory credential store; a single lock covers the record map and the email index
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: RwLock<MemoryState>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn create(&self, new_user: NewUser) -> StoreResult<User> {
        let mut state = self.write()?;
        if state.emails.contains_key(&new_user.email) {
            return Err(StoreError::email_conflict());
        }

        let user = User::from_new(new_user);
        state.emails.insert(user.email.clone(), user.id);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn find_by_email(&self, email: &Email) -> StoreResult<Option<User>> {
        let state = self.read()?;
        Ok(state.emails.get(email).and_then(|id| state.users.get(id)).cloned())
    }

    fn find_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    fn update(&self, id: &UserId, changes: UserChanges) -> StoreResult<User> {
        let mut state = self.write()?;
        let mut user = state
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if let Some(email) = &changes.email {
            if state.emails.get(email).is_some_and(|owner| owner != id) {
                return Err(StoreError::email_conflict());
            }
        }

        let old_email = user.email.clone();
        user.apply(changes);
        if user.email != old_email {
            state.emails.remove(&old_email);
            state.emails.insert(user.email.clone(), user.id);
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn delete(&self, id: &UserId) -> StoreResult<User> {
        let mut state = self.write()?;
        let user = state
            .users
            .remove(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        state.emails.remove(&user.email);
        Ok(user)
    }

    fn list_all(&self) -> StoreResult<Vec<User>> {
        Ok(self.read()?.users.values().cloned().collect())
    }
}

/// Store whose every call fails with a backend error
pub struct FailingCredentialStore;

impl FailingCredentialStore {
    fn fail<T>() -> StoreResult<T> {
        Err(StoreError::Backend("injected failure".to_string()))
    }
}

impl CredentialStore for FailingCredentialStore {
    fn create(&self, _new_user: NewUser) -> StoreResult<User> {
        Self::fail()
    }

    fn find_by_email(&self, _email: &Email) -> StoreResult<Option<User>> {
        Self::fail()
    }

    fn find_by_id(&self, _id: &UserId) -> StoreResult<Option<User>> {
        Self::fail()
    }

    fn update(&self, _id: &UserId, _changes: UserChanges) -> StoreResult<User> {
        Self::fail()
    }

    fn delete(&self, _id: &UserId) -> StoreResult<User> {
        Self::fail()
    }

    fn list_all(&self) -> StoreResult<Vec<User>> {
        Self::fail()
    }
}

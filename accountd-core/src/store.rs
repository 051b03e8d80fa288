//! Credential store boundary

use crate::{Email, NewUser, StoreError, User, UserChanges, UserId};

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence for user records.
///
/// Implementations own the email uniqueness constraint: a `create` or an
/// email-changing `update` that would duplicate an address must fail with
/// [`StoreError::Conflict`] and leave the store unchanged, even when
/// called concurrently.
pub trait CredentialStore: Send + Sync {
    /// Persist a new record with a fresh id
    fn create(&self, new_user: NewUser) -> StoreResult<User>;

    fn find_by_email(&self, email: &Email) -> StoreResult<Option<User>>;

    fn find_by_id(&self, id: &UserId) -> StoreResult<Option<User>>;

    /// Apply `changes` to an existing record and return the result
    fn update(&self, id: &UserId, changes: UserChanges) -> StoreResult<User>;

    /// Remove a record, returning what was removed
    fn delete(&self, id: &UserId) -> StoreResult<User>;

    /// All records in id order (which is creation order for ULIDs)
    fn list_all(&self) -> StoreResult<Vec<User>>;
}

//! Authentication and authorization decisions

use crate::{AccountError, CredentialStore, Email, PasswordHasher, Principal, Result, UserId};
use tracing::debug;

/// Check an email/password pair against the store.
///
/// Unknown email, malformed email and wrong password all come back as
/// `InvalidCredentials`, and each path runs exactly one hash verification.
pub fn authenticate(
    store: &dyn CredentialStore,
    hasher: &PasswordHasher,
    email: &str,
    password: &str,
) -> Result<Principal> {
    let email = match Email::new(email) {
        Ok(email) => email,
        Err(_) => {
            hasher.verify_dummy(password);
            return Err(AccountError::InvalidCredentials);
        }
    };

    let user = match store.find_by_email(&email)? {
        Some(user) => user,
        None => {
            hasher.verify_dummy(password);
            debug!("Login rejected: no account for {}", email);
            return Err(AccountError::InvalidCredentials);
        }
    };

    if !hasher.verify(password, &user.password_hash) {
        debug!("Login rejected: password mismatch for {}", user.id);
        return Err(AccountError::InvalidCredentials);
    }

    Ok(user.principal())
}

/// Allow a mutation of `target_owner`'s record if the principal owns it or is an admin
pub fn authorize(principal: &Principal, target_owner: &UserId) -> Result<()> {
    if principal.id == *target_owner || principal.is_admin() {
        Ok(())
    } else {
        debug!("Denied {} acting on {}", principal.id, target_owner);
        Err(AccountError::Forbidden)
    }
}

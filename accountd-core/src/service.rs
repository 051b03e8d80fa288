//! Account operations behind the HTTP surface

use crate::auth::{authenticate, authorize, PasswordHasher, SessionToken, TokenIssuer};
use crate::{
    validate_name, validate_password, AccountError, Credentials, CredentialStore, Email, NewAccount, NewUser,
    Principal, PublicUser, Result, Role, UserChanges, UserId, UserPatch,
};
use std::sync::Arc;
use tracing::{debug, info};

/// A verified principal together with the token issued for it
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub token: SessionToken,
}

/// Outcome of a successful registration
#[derive(Debug, Clone)]
pub struct Registration {
    pub session: Session,
    pub user: PublicUser,
}

/// Account service tying the store, hasher and token issuer together
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher, issuer: TokenIssuer) -> Self {
        AccountService { store, hasher, issuer }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Create a `USER` account and log it in
    pub fn register(&self, account: NewAccount) -> Result<Registration> {
        let user = self.create_with_role(account, Role::User)?;
        let principal = Principal {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        };
        let token = self.issuer.issue(&principal)?;

        info!("Registered user {}", user.id);
        Ok(Registration {
            session: Session { principal, token },
            user,
        })
    }

    /// Check credentials and issue a session token
    pub fn login(&self, credentials: Credentials) -> Result<Session> {
        let principal = authenticate(self.store.as_ref(), &self.hasher, &credentials.email, &credentials.password)?;
        let token = self.issuer.issue(&principal)?;

        debug!("Issued session for {}", principal.id);
        Ok(Session { principal, token })
    }

    /// Resolve a bearer token into the principal it was issued for
    pub fn authenticate_token(&self, token: &str) -> Result<Principal> {
        self.issuer.verify(token)
    }

    /// Create a `USER` account without logging it in
    pub fn create_user(&self, account: NewAccount) -> Result<PublicUser> {
        self.create_with_role(account, Role::User)
    }

    /// Create an `ADMIN` account unless one already exists for the email.
    ///
    /// Returns `None` when the email is already taken, whatever its role.
    pub fn ensure_admin(&self, account: NewAccount) -> Result<Option<PublicUser>> {
        match self.create_with_role(account, Role::Admin) {
            Ok(user) => {
                info!("Bootstrapped admin {}", user.id);
                Ok(Some(user))
            }
            Err(AccountError::EmailTaken) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every user, oldest first. An empty store is reported as `NotFound`.
    pub fn list_users(&self) -> Result<Vec<PublicUser>> {
        let users = self.store.list_all()?;
        if users.is_empty() {
            return Err(AccountError::NotFound("No users found".to_string()));
        }
        Ok(users.iter().map(PublicUser::from).collect())
    }

    pub fn get_user(&self, id: &str) -> Result<PublicUser> {
        let id = UserId::parse(id).map_err(|_| user_not_found())?;
        self.store
            .find_by_id(&id)?
            .map(|user| user.to_public())
            .ok_or_else(user_not_found)
    }

    /// Update a record on behalf of `principal`.
    ///
    /// Checks run in a fixed order: patch validation, owner-or-admin
    /// authorization, then existence.
    pub fn update_user(&self, principal: &Principal, id: &str, patch: UserPatch) -> Result<PublicUser> {
        let mut changes = validate_patch(&patch)?;
        let target = self.authorize_target(principal, id)?;

        let existing = self.store.find_by_id(&target)?.ok_or_else(user_not_found)?;

        if let Some(password) = patch.password.as_deref() {
            changes.password_hash = Some(self.hasher.hash(password)?);
        }

        if changes.is_empty() {
            return Ok(existing.to_public());
        }

        let updated = self.store.update(&target, changes)?;
        info!("User {} updated by {}", updated.id, principal.id);
        Ok(updated.to_public())
    }

    /// Delete a record on behalf of `principal`, returning what was removed
    pub fn delete_user(&self, principal: &Principal, id: &str) -> Result<PublicUser> {
        let target = self.authorize_target(principal, id)?;

        if self.store.find_by_id(&target)?.is_none() {
            return Err(user_not_found());
        }

        let removed = self.store.delete(&target)?;
        info!("User {} deleted by {}", removed.id, principal.id);
        Ok(removed.to_public())
    }

    fn create_with_role(&self, account: NewAccount, role: Role) -> Result<PublicUser> {
        let account = account.validate()?;
        let password_hash = self.hasher.hash(&account.password)?;

        let user = self.store.create(NewUser {
            email: account.email,
            password_hash,
            name: account.name,
            role,
        })?;

        Ok(user.to_public())
    }

    /// Authorize before looking at existence. An id that does not parse can
    /// only belong to nobody, so only an admin gets as far as `NotFound`.
    fn authorize_target(&self, principal: &Principal, id: &str) -> Result<UserId> {
        match UserId::parse(id) {
            Ok(target) => {
                authorize(principal, &target)?;
                Ok(target)
            }
            Err(_) if principal.is_admin() => Err(user_not_found()),
            Err(_) => Err(AccountError::Forbidden),
        }
    }
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("hasher", &self.hasher)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

fn user_not_found() -> AccountError {
    AccountError::NotFound("User not found".to_string())
}

fn validate_patch(patch: &UserPatch) -> Result<UserChanges> {
    let email = patch.email.as_deref().map(Email::new).transpose()?;
    let name = patch.name.as_deref().map(validate_name).transpose()?;
    if let Some(password) = patch.password.as_deref() {
        validate_password(password)?;
    }

    Ok(UserChanges {
        email,
        password_hash: None,
        name,
        role: patch.role,
    })
}

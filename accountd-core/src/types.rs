//! Core data types for accountd

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Unique, immutable user identifier using ULID for time-ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(ulid::Ulid);

impl UserId {
    /// Generate a new identifier with the current timestamp
    pub fn new() -> Self {
        UserId(ulid::Ulid::new())
    }

    /// Parse the canonical 26-character form
    pub fn parse(s: &str) -> crate::Result<Self> {
        ulid::Ulid::from_string(s)
            .map(UserId)
            .map_err(|e| crate::AccountError::Validation(format!("invalid user id '{}': {}", s, e)))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = crate::AccountError;

    fn from_str(s: &str) -> crate::Result<Self> {
        UserId::parse(s)
    }
}

/// Normalized email address (trimmed, lower-cased)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Create an email with validation
    pub fn new(raw: &str) -> crate::Result<Self> {
        let email = raw.trim().to_lowercase();

        if email.is_empty() {
            return Err(crate::AccountError::Validation("email must not be empty".to_string()));
        }

        if email.chars().any(char::is_whitespace) {
            return Err(crate::AccountError::Validation(format!(
                "email '{}' must not contain whitespace",
                email
            )));
        }

        let (local, domain) = match email.split_once('@') {
            Some(parts) => parts,
            None => {
                return Err(crate::AccountError::Validation(format!(
                    "email '{}' is missing '@'",
                    email
                )))
            }
        };

        let domain_ok = !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains("..");

        if local.is_empty() || !domain_ok {
            return Err(crate::AccountError::Validation(format!(
                "email '{}' is not a valid address",
                email
            )));
        }

        Ok(Email(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = crate::AccountError;

    fn try_from(value: String) -> crate::Result<Self> {
        Email::new(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// Account role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored user record.
///
/// Carries the password hash, so it never leaves the service; use
/// [`PublicUser`] for anything returned to a caller.
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Materialize a new record from creation fields
    pub fn from_new(new_user: NewUser) -> Self {
        let now = Utc::now();
        User {
            id: UserId::new(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: new_user.name,
            role: new_user.role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a set of changes, bumping `updated_at`
    pub fn apply(&mut self, changes: UserChanges) {
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            self.password_hash = password_hash;
        }
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(role) = changes.role {
            self.role = role;
        }
        self.updated_at = Utc::now();
    }

    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Outward-facing view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Fields required to create a user record in the store
#[derive(Clone)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

/// Partial update applied by the store; `None` leaves a field untouched
#[derive(Clone, Default)]
pub struct UserChanges {
    pub email: Option<Email>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password_hash.is_none() && self.name.is_none() && self.role.is_none()
    }
}

/// Authenticated identity for the lifetime of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub email: Email,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Registration / create-user request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Validated registration fields
#[derive(Debug, Clone)]
pub struct ValidAccount {
    pub email: Email,
    pub password: String,
    pub name: String,
}

impl NewAccount {
    pub fn validate(self) -> crate::Result<ValidAccount> {
        let email = Email::new(&self.email)?;
        validate_password(&self.password)?;
        let name = validate_name(&self.name)?;

        Ok(ValidAccount {
            email,
            password: self.password,
            name,
        })
    }
}

/// Login request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Update request body; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Reject passwords shorter than [`MIN_PASSWORD_LENGTH`] characters
pub fn validate_password(password: &str) -> crate::Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(crate::AccountError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Trim a display name and reject it if nothing remains
pub fn validate_name(name: &str) -> crate::Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(crate::AccountError::Validation("name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

//! Error types for accountd

use thiserror::Error;

/// Outcome of a rejected account operation.
///
/// Every variant is terminal for the request that produced it. Only
/// [`AccountError::Store`] indicates a fault; the others are expected
/// control flow and map one-to-one onto HTTP statuses at the boundary.
#[derive(Error, Debug)]
pub enum AccountError {
    /// Unknown email or wrong password. The two cases are never told apart.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already exists")]
    EmailTaken,

    #[error("Invalid session token")]
    TokenInvalid,

    #[error("Session token has expired")]
    TokenExpired,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccountError {
    /// Stable machine-readable code used in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::InvalidCredentials => "invalid_credentials",
            AccountError::EmailTaken => "email_taken",
            AccountError::TokenInvalid => "token_invalid",
            AccountError::TokenExpired => "token_expired",
            AccountError::Forbidden => "forbidden",
            AccountError::NotFound(_) => "not_found",
            AccountError::Validation(_) => "validation_error",
            AccountError::Store(_) => "store_error",
            AccountError::Internal(_) => "internal_error",
        }
    }

    /// Whether this error should be reported as an unexpected fault.
    pub fn is_fault(&self) -> bool {
        matches!(self, AccountError::Store(_) | AccountError::Internal(_))
    }
}

/// Failure signalled by a [`crate::CredentialStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint was violated on the named field.
    #[error("Unique constraint violated on {field}")]
    Conflict { field: String },

    #[error("Record not found: {id}")]
    NotFound { id: String },

    #[error("Backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn email_conflict() -> Self {
        StoreError::Conflict {
            field: "email".to_string(),
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => AccountError::EmailTaken,
            StoreError::NotFound { .. } => AccountError::NotFound("User not found".to_string()),
            StoreError::Backend(msg) => AccountError::Store(msg),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("serialization: {}", err))
    }
}

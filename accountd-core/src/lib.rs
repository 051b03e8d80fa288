//! Core account model, authentication and authorization for accountd

pub mod auth;
pub mod error;
pub mod service;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use auth::{authenticate, authorize, PasswordHasher, SessionToken, TokenConfig, TokenIssuer};
pub use error::*;
pub use service::*;
pub use store::*;
pub use types::*;

/// Result type alias for accountd operations
pub type Result<T> = std::result::Result<T, AccountError>;

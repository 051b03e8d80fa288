//! Authentication and authorization for accountd
//!
//! This module implements the security plane with:
//! - Argon2id password hashing
//! - HS256 session tokens carrying the principal
//! - Credential checks and owner-or-admin authorization

pub mod decision;
pub mod jwt;
pub mod password;

pub use decision::*;
pub use jwt::*;
pub use password::*;

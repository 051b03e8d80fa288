//! Session token issuance and verification
//!
//! Session tokens are HS256 JWTs signed with a process-wide secret. The
//! subject is the user id; email and role travel as custom claims so a
//! verified token yields a complete [`Principal`] without a store lookup.

use crate::{AccountError, Email, Principal, Result, Role, UserId};
use jwt_simple::prelude::*;
use jwt_simple::JWTError;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Shortest accepted signing secret, in bytes
pub const MIN_SECRET_LENGTH: usize = 32;

/// Default session lifetime
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Default `iss` claim
pub const DEFAULT_ISSUER: &str = "accountd";

/// Custom claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: Email,
    pub role: Role,
}

/// Token issuer configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Value of the `iss` claim; tokens from any other issuer are rejected
    pub issuer: String,
    /// How long an issued token stays valid
    pub ttl: Duration,
    /// Clock skew tolerated when checking time claims
    pub leeway: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        TokenConfig {
            issuer: DEFAULT_ISSUER.to_string(),
            ttl: DEFAULT_TOKEN_TTL,
            leeway: Duration::ZERO,
        }
    }
}

/// A freshly signed session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    token: String,
    issued_at: u64,
    expires_at: u64,
}

impl SessionToken {
    /// Get the token string
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Issuance time, seconds since the Unix epoch
    pub fn issued_at(&self) -> u64 {
        self.issued_at
    }

    /// Expiry time, seconds since the Unix epoch
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Lifetime in seconds as seen at issuance
    pub fn expires_in(&self) -> u64 {
        self.expires_at.saturating_sub(self.issued_at)
    }
}

/// Creates and verifies session tokens
#[derive(Clone)]
pub struct TokenIssuer {
    key: HS256Key,
    config: TokenConfig,
}

impl TokenIssuer {
    /// Create an issuer from a shared secret
    pub fn new(secret: &[u8], config: TokenConfig) -> Result<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AccountError::Validation(format!(
                "signing secret must be at least {} bytes, got {}",
                MIN_SECRET_LENGTH,
                secret.len()
            )));
        }

        if config.ttl.as_secs() == 0 {
            return Err(AccountError::Validation("token ttl must be at least one second".to_string()));
        }

        Ok(TokenIssuer {
            key: HS256Key::from_bytes(secret),
            config,
        })
    }

    /// Create an issuer with a random secret that only lives as long as the process
    pub fn ephemeral(config: TokenConfig) -> Result<Self> {
        let mut secret = [0u8; 64];
        OsRng.fill_bytes(&mut secret);
        Self::new(&secret, config)
    }

    /// Sign a token for the principal, valid from now for the configured ttl
    pub fn issue(&self, principal: &Principal) -> Result<SessionToken> {
        self.issue_at(principal, Clock::now_since_epoch())
    }

    pub(crate) fn issue_at(&self, principal: &Principal, now: UnixTimeStamp) -> Result<SessionToken> {
        let valid_for = jwt_simple::prelude::Duration::from_secs(self.config.ttl.as_secs());
        let custom = SessionClaims {
            email: principal.email.clone(),
            role: principal.role,
        };

        let mut claims = Claims::with_custom_claims(custom, valid_for)
            .with_issuer(&self.config.issuer)
            .with_subject(principal.id);
        claims.issued_at = Some(now);
        claims.invalid_before = Some(now);
        claims.expires_at = Some(now + valid_for);

        let token = self
            .key
            .authenticate(claims)
            .map_err(|e| AccountError::Internal(format!("token signing failed: {}", e)))?;

        Ok(SessionToken {
            token,
            issued_at: now.as_secs(),
            expires_at: (now + valid_for).as_secs(),
        })
    }

    /// Verify signature, issuer and expiry, and rebuild the principal.
    ///
    /// `TokenExpired` is only returned for tokens whose signature checked out;
    /// everything else that fails is `TokenInvalid`.
    pub fn verify(&self, token: &str) -> Result<Principal> {
        let leeway = jwt_simple::prelude::Duration::from_secs(self.config.leeway.as_secs());
        let options = VerificationOptions {
            allowed_issuers: Some(HashSet::from([self.config.issuer.clone()])),
            time_tolerance: Some(leeway),
            ..Default::default()
        };

        let claims = self
            .key
            .verify_token::<SessionClaims>(token, Some(options))
            .map_err(classify_verification_error)?;

        let expires_at = claims.expires_at.ok_or(AccountError::TokenInvalid)?;
        if Clock::now_since_epoch() >= expires_at + leeway {
            return Err(AccountError::TokenExpired);
        }

        let id = claims
            .subject
            .as_deref()
            .ok_or(AccountError::TokenInvalid)
            .and_then(|sub| UserId::parse(sub).map_err(|_| AccountError::TokenInvalid))?;

        Ok(Principal {
            id,
            email: claims.custom.email,
            role: claims.custom.role,
        })
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn classify_verification_error(err: jwt_simple::Error) -> AccountError {
    match err.downcast_ref::<JWTError>() {
        Some(JWTError::TokenHasExpired) => AccountError::TokenExpired,
        _ => AccountError::TokenInvalid,
    }
}

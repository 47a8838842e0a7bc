use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bugtrackd_core::UserId;

use crate::{PermissionSet, Role};

/// JWT claims model (transport-agnostic).
///
/// The permission map is resolved once, at issuance, and baked into the
/// token: role or registry changes do not affect tokens already in the
/// wild until they expire or are reissued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,

    /// Email as stored on the account.
    pub email: String,

    /// Role names held at issuance.
    pub roles: Vec<Role>,

    /// Effective permission flags resolved at issuance.
    pub permissions: PermissionSet,

    /// Issued-at, seconds since the epoch (standard `iat` claim).
    pub iat: i64,

    /// Expiry, seconds since the epoch (standard `exp` claim).
    pub exp: i64,
}

impl AuthClaims {
    /// Build claims for a principal with a TTL from `now`.
    pub fn new(
        sub: UserId,
        email: impl Into<String>,
        roles: Vec<Role>,
        permissions: PermissionSet,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            sub,
            email: email.into(),
            roles,
            permissions,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the claim time window.
///
/// Note: this validates the *claims* only. Signature verification is the
/// token layer's job.
pub fn validate_claims(claims: &AuthClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

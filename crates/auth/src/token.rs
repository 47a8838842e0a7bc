//! Token issuance and verification (HS256 over a shared secret).

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::AuthClaims;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No signing secret was configured at process start.
    #[error("no token signing secret configured")]
    MissingSecret,

    /// Encoding/signing failed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// The token's `exp` claim is in the past.
    #[error("token has expired")]
    Expired,

    /// Anything else: malformed token, bad signature, wrong algorithm.
    #[error("invalid token")]
    Invalid,
}

/// Issues signed, time-limited tokens for authenticated principals.
pub trait TokenSigner: Send + Sync {
    fn issue(&self, claims: &AuthClaims) -> Result<String, TokenError>;
}

/// Verifies a presented token and returns its decoded claims.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthClaims, TokenError>;
}

/// HS256 signer/verifier over a shared secret.
///
/// The secret is read from configuration once at startup; constructing the
/// struct without one keeps the process alive (read paths still work) but
/// every issue/verify call fails.
pub struct Hs256Tokens {
    secret: Option<Vec<u8>>,
}

impl Hs256Tokens {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Some(secret.into()),
        }
    }

    pub fn unconfigured() -> Self {
        Self { secret: None }
    }

    pub fn from_secret(secret: Option<String>) -> Self {
        match secret {
            Some(s) => Self::new(s.into_bytes()),
            None => Self::unconfigured(),
        }
    }

    fn secret(&self) -> Result<&[u8], TokenError> {
        self.secret.as_deref().ok_or(TokenError::MissingSecret)
    }
}

impl TokenSigner for Hs256Tokens {
    fn issue(&self, claims: &AuthClaims) -> Result<String, TokenError> {
        let secret = self.secret()?;
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl TokenVerifier for Hs256Tokens {
    fn verify(&self, token: &str) -> Result<AuthClaims, TokenError> {
        let secret = self.secret()?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        jsonwebtoken::decode::<AuthClaims>(token, &DecodingKey::from_secret(secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PermissionSet, Role};
    use bugtrackd_core::UserId;
    use chrono::{Duration, Utc};

    fn claims(ttl: Duration) -> AuthClaims {
        let permissions: PermissionSet = ["canViewData"].into_iter().collect();
        AuthClaims::new(
            UserId::new(),
            "alice@example.com",
            vec![Role::new("Developer")],
            permissions,
            Utc::now(),
            ttl,
        )
    }

    #[test]
    fn sign_then_verify_round_trips_claims() {
        let tokens = Hs256Tokens::new(b"test-secret".to_vec());
        let issued = claims(Duration::hours(1));

        let encoded = tokens.issue(&issued).unwrap();
        let decoded = tokens.verify(&encoded).unwrap();

        assert_eq!(decoded, issued);
        assert!(decoded.permissions.allows_name("canViewData"));
    }

    #[test]
    fn missing_secret_is_a_signing_error() {
        let tokens = Hs256Tokens::unconfigured();
        assert_eq!(
            tokens.issue(&claims(Duration::hours(1))).unwrap_err(),
            TokenError::MissingSecret
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = Hs256Tokens::new(b"test-secret".to_vec());
        let encoded = tokens.issue(&claims(Duration::seconds(-3600))).unwrap();
        assert_eq!(tokens.verify(&encoded).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let signer = Hs256Tokens::new(b"secret-a".to_vec());
        let verifier = Hs256Tokens::new(b"secret-b".to_vec());

        let encoded = signer.issue(&claims(Duration::hours(1))).unwrap();
        assert_eq!(verifier.verify(&encoded).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn garbage_is_rejected() {
        let tokens = Hs256Tokens::new(b"test-secret".to_vec());
        assert_eq!(tokens.verify("not.a.token").unwrap_err(), TokenError::Invalid);
    }
}

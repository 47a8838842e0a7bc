//! Route authorization guard, permission half.
//!
//! Thin adapters from the pure policy checks in `bugtrackd-auth` to
//! [`ApiError`] responses. Called by handlers after the middleware has
//! attached the principal.

use bugtrackd_auth::{AccessRule, Ownership, Permission, authorize, evaluate};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

/// Require a flat permission; 403 with `message` when it is missing.
pub fn require_permission(
    principal: &PrincipalContext,
    name: &'static str,
    message: &str,
) -> Result<(), ApiError> {
    authorize(principal.permissions(), &Permission::new(name))
        .map_err(|_| ApiError::Forbidden(message.to_string()))
}

/// Evaluate an ownership-or-permission rule set; 403 with `message` when no
/// rule grants.
pub fn require_scoped(
    principal: &PrincipalContext,
    rules: &[AccessRule],
    ownership: Ownership,
    message: &str,
) -> Result<(), ApiError> {
    evaluate(rules, principal.permissions(), ownership)
        .map_err(|_| ApiError::Forbidden(message.to_string()))
}

//! `bugtrackd-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: claims,
//! permission resolution, and access policy are deterministic functions;
//! token signing and password hashing wrap the respective libraries behind
//! small contracts.

pub mod claims;
pub mod password;
pub mod permissions;
pub mod policy;
pub mod resolve;
pub mod roles;
pub mod token;

pub use claims::{AuthClaims, TokenValidationError, validate_claims};
pub use password::{hash_password, verify_password};
pub use permissions::{Permission, PermissionSet};
pub use policy::{Allow, AccessRule, AuthzError, Ownership, authorize, evaluate};
pub use resolve::{merge_permissions, resolve_permissions};
pub use roles::{Role, RoleGrants, default_role_grants};
pub use token::{Hs256Tokens, TokenError, TokenSigner, TokenVerifier};

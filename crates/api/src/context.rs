use bugtrackd_audit::Actor;
use bugtrackd_auth::{AuthClaims, PermissionSet, Role};
use bugtrackd_core::UserId;

/// Principal context for a request: the authenticated identity plus the
/// permission map that was baked into its token at issuance.
///
/// Inserted into request extensions by the auth middleware; handlers and
/// the audit log read it from there.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalContext {
    user_id: UserId,
    email: String,
    roles: Vec<Role>,
    permissions: PermissionSet,
}

impl PrincipalContext {
    pub fn from_claims(claims: AuthClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            roles: claims.roles,
            permissions: claims.permissions,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Snapshot for the audit record's `auth` field.
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            email: self.email.clone(),
            roles: self.roles.clone(),
        }
    }
}

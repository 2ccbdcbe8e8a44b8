use eshop_auth::{ClaimSet, Role};
use eshop_core::UserId;

/// Principal context for a request (authenticated identity + roles).
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    claims: ClaimSet,
}

impl PrincipalContext {
    pub fn new(claims: ClaimSet) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> UserId {
        self.claims.user_id()
    }

    pub fn identifier(&self) -> &str {
        self.claims.identifier()
    }

    pub fn roles(&self) -> &[Role] {
        self.claims.roles()
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }
}

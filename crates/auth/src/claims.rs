use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use eshop_core::UserId;

use crate::roles::{Role, join_roles, split_roles};

/// Claims exactly as they travel inside the signed token.
///
/// Field names are the wire contract shared with the admin client; renaming
/// one invalidates every token already issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Login identifier (user name).
    pub sub: String,
    pub uid: UserId,
    pub given_name: String,
    pub email: String,
    /// Role names joined by [`crate::ROLE_SEPARATOR`].
    #[serde(default)]
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("token signature does not verify")]
    BadSignature,

    #[error("token issuer or audience mismatch")]
    IssuerMismatch,

    #[error("malformed token: {0}")]
    Malformed(String),
}

impl TokenError {
    /// Stable label for logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Expired => "expired",
            TokenError::NotYetValid => "not_yet_valid",
            TokenError::BadSignature => "bad_signature",
            TokenError::IssuerMismatch => "issuer_mismatch",
            TokenError::Malformed(_) => "malformed",
        }
    }
}

/// Identity carried by a session token, with typed accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    user_id: UserId,
    identifier: String,
    display_name: String,
    email: String,
    roles: Vec<Role>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ClaimSet {
    /// Timestamps are truncated to whole seconds, the token's resolution.
    pub fn new(
        user_id: UserId,
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        roles: Vec<Role>,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        let issued_at = truncate_to_seconds(issued_at);
        Self {
            user_id,
            identifier: identifier.into(),
            display_name: display_name.into(),
            email: email.into(),
            roles,
            issued_at,
            expires_at: issued_at + lifetime,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == name)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn to_wire(&self, issuer: &str, audience: &str) -> TokenClaims {
        TokenClaims {
            sub: self.identifier.clone(),
            uid: self.user_id,
            given_name: self.display_name.clone(),
            email: self.email.clone(),
            role: join_roles(&self.roles),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            iat: self.issued_at.timestamp(),
            exp: self.expires_at.timestamp(),
        }
    }

    pub fn from_wire(claims: TokenClaims) -> Result<Self, TokenError> {
        let roles = split_roles(&claims.role)
            .map_err(|e| TokenError::Malformed(format!("role claim: {e}")))?;
        let issued_at = timestamp(claims.iat, "iat")?;
        let expires_at = timestamp(claims.exp, "exp")?;

        Ok(Self {
            user_id: claims.uid,
            identifier: claims.sub,
            display_name: claims.given_name,
            email: claims.email,
            roles,
            issued_at,
            expires_at,
        })
    }
}

fn timestamp(secs: i64, name: &str) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| TokenError::Malformed(format!("{name} out of range")))
}

fn truncate_to_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

/// Check the token lifetime against `now`.
///
/// Independent of signature and issuer checks: a perfectly signed token is
/// still rejected once `now` is past its expiry. A token is valid at exactly
/// its expiry instant.
pub fn validate_lifetime(claims: &ClaimSet, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenError::Malformed("expires_at <= issued_at".into()));
    }
    if now < claims.issued_at {
        return Err(TokenError::NotYetValid);
    }
    if now > claims.expires_at {
        return Err(TokenError::Expired);
    }
    Ok(())
}

use thiserror::Error;

use eshop_core::DomainError;

use crate::claims::TokenError;

/// Every failure the TokenAuthority can report.
///
/// Store and signing failures are translated into these variants; callers never
/// see a raw collaborator error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("not found")]
    NotFound,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("account is locked out")]
    Locked,

    #[error("identifier already exists")]
    DuplicateIdentifier,

    #[error("email already exists")]
    DuplicateEmail,

    #[error("account creation failed: {0}")]
    CreationFailed(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl AuthError {
    /// Stable label for logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::NotFound => "not_found",
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::Locked => "locked",
            AuthError::DuplicateIdentifier => "duplicate_identifier",
            AuthError::DuplicateEmail => "duplicate_email",
            AuthError::CreationFailed(_) => "creation_failed",
            AuthError::Validation(_) => "validation_violation",
            AuthError::Token(e) => e.kind(),
            AuthError::Unavailable(_) => "unavailable",
            AuthError::Signing(_) => "signing_failed",
        }
    }
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NotFound => AuthError::NotFound,
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => AuthError::Validation(msg),
        }
    }
}

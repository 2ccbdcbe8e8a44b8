//! Credential store contract.
//!
//! The store owns credential records, secret hashes and lockout counters. The
//! authority only reads through this trait and never holds that state itself.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use eshop_core::{Entity, FieldValue, Record, UserId};

use crate::roles::Role;

/// Field names understood by [`Credential`] filters.
pub mod fields {
    pub const USER_NAME: &str = "userName";
    pub const PHONE_NUMBER: &str = "phoneNumber";
    pub const EMAIL: &str = "email";
}

/// A stored account, minus its secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: UserId,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub email: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Credential {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

impl Record for Credential {
    fn text(&self, field: &str) -> Option<&str> {
        match field {
            fields::USER_NAME => Some(&self.user_name),
            fields::PHONE_NUMBER => Some(&self.phone_number),
            fields::EMAIL => Some(&self.email),
            _ => None,
        }
    }

    fn has_value(&self, field: &str, value: &FieldValue) -> bool {
        match value {
            FieldValue::Text(v) => self.text(field).is_some_and(|t| t.eq_ignore_ascii_case(v)),
            FieldValue::Int(_) => false,
        }
    }
}

/// Data needed to create an account; the store hashes `password`.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub email: String,
    pub phone_number: String,
    pub password: String,
}

/// Mutable display attributes of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub email: String,
    pub phone_number: String,
}

/// Result of the store's atomic verify-and-count operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInOutcome {
    Succeeded,
    Failed,
    LockedOut,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("identifier already taken")]
    DuplicateIdentifier,

    #[error("email already taken")]
    DuplicateEmail,

    /// The store refused the record (e.g. password policy).
    #[error("rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// "Not found" is `Ok(None)` (or `Ok(0)` for updates), never an error.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive exact match on the login identifier.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Credential>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<Credential>, StoreError>;

    /// Case-insensitive exact match on the email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError>;

    /// Whether any credential other than `except` owns `email`.
    async fn email_taken_by_other(&self, email: &str, except: UserId) -> Result<bool, StoreError>;

    /// Verify `secret` and update the lockout counter in one atomic step.
    ///
    /// With `lockout_on_failure`, a failed attempt counts towards lockout.
    /// A locked account reports `LockedOut` even for the correct secret.
    async fn verify_secret(
        &self,
        id: UserId,
        secret: &str,
        lockout_on_failure: bool,
    ) -> Result<SignInOutcome, StoreError>;

    /// Run a verification that can never succeed, at the same cost as
    /// [`CredentialStore::verify_secret`]. Used for unknown identifiers so
    /// they take as long to refuse as a wrong secret.
    async fn verify_unknown(&self, secret: &str) -> Result<SignInOutcome, StoreError>;

    async fn create(&self, credential: NewCredential) -> Result<UserId, StoreError>;

    /// Returns the number of records changed (0 when `id` is unknown).
    async fn update(&self, id: UserId, update: CredentialUpdate) -> Result<u64, StoreError>;

    async fn list_roles(&self, id: UserId) -> Result<Vec<Role>, StoreError>;
}

#[async_trait]
impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Credential>, StoreError> {
        (**self).find_by_identifier(identifier).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Credential>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn email_taken_by_other(&self, email: &str, except: UserId) -> Result<bool, StoreError> {
        (**self).email_taken_by_other(email, except).await
    }

    async fn verify_secret(
        &self,
        id: UserId,
        secret: &str,
        lockout_on_failure: bool,
    ) -> Result<SignInOutcome, StoreError> {
        (**self).verify_secret(id, secret, lockout_on_failure).await
    }

    async fn verify_unknown(&self, secret: &str) -> Result<SignInOutcome, StoreError> {
        (**self).verify_unknown(secret).await
    }

    async fn create(&self, credential: NewCredential) -> Result<UserId, StoreError> {
        (**self).create(credential).await
    }

    async fn update(&self, id: UserId, update: CredentialUpdate) -> Result<u64, StoreError> {
        (**self).update(id, update).await
    }

    async fn list_roles(&self, id: UserId) -> Result<Vec<Role>, StoreError> {
        (**self).list_roles(id).await
    }
}

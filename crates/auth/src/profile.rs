//! Request and view shapes for account management.
//!
//! Requests validate themselves before any store call is made.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use eshop_core::{DomainError, DomainResult, UserId};

use crate::store::{Credential, CredentialUpdate, NewCredential};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 200;
/// Oldest accepted date of birth, in years before today.
pub const MAX_AGE_YEARS: u32 = 100;

/// Profile projection of a credential. Never carries secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVm {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub user_name: String,
    pub email: String,
    pub dob: NaiveDate,
}

impl From<&Credential> for UserVm {
    fn from(c: &Credential) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            phone_number: c.phone_number.clone(),
            user_name: c.user_name.clone(),
            email: c.email.clone(),
            dob: c.dob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

impl LoginRequest {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            remember_me: false,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        required("userName", &self.user_name)?;
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    pub user_name: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterRequest {
    pub fn validate(&self, today: NaiveDate) -> DomainResult<()> {
        person_name("firstName", &self.first_name)?;
        person_name("lastName", &self.last_name)?;
        date_of_birth(self.dob, today)?;
        email(&self.email)?;
        required("userName", &self.user_name)?;
        if self.user_name.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("userName must not contain whitespace"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.password != self.confirm_password {
            return Err(DomainError::validation("confirmPassword does not match password"));
        }
        Ok(())
    }

    pub(crate) fn to_new_credential(&self) -> NewCredential {
        NewCredential {
            user_name: self.user_name.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            dob: self.dob,
            email: self.email.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateRequest {
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
}

impl UserUpdateRequest {
    pub fn validate(&self, today: NaiveDate) -> DomainResult<()> {
        person_name("firstName", &self.first_name)?;
        person_name("lastName", &self.last_name)?;
        date_of_birth(self.dob, today)?;
        email(&self.email)
    }
}

impl From<&UserUpdateRequest> for CredentialUpdate {
    fn from(r: &UserUpdateRequest) -> Self {
        Self {
            first_name: r.first_name.trim().to_string(),
            last_name: r.last_name.trim().to_string(),
            dob: r.dob,
            email: r.email.trim().to_string(),
            phone_number: r.phone_number.trim().to_string(),
        }
    }
}

fn required(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn person_name(field: &str, value: &str) -> DomainResult<()> {
    required(field, value)?;
    if value.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn date_of_birth(dob: NaiveDate, today: NaiveDate) -> DomainResult<()> {
    if dob > today {
        return Err(DomainError::validation("dob cannot be in the future"));
    }
    let oldest = today
        .checked_sub_months(Months::new(MAX_AGE_YEARS * 12))
        .unwrap_or(NaiveDate::MIN);
    if dob < oldest {
        return Err(DomainError::validation(format!(
            "dob cannot be more than {MAX_AGE_YEARS} years ago"
        )));
    }
    Ok(())
}

fn email(value: &str) -> DomainResult<()> {
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation("email format is not valid"));
    }
    Ok(())
}

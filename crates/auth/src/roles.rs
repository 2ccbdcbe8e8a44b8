use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use eshop_core::{DomainError, DomainResult};

/// Separator used when a role set is flattened into a single claim value.
pub const ROLE_SEPARATOR: char = ';';

/// Role name used for RBAC claim propagation.
///
/// A role name is never empty and never contains [`ROLE_SEPARATOR`], which is
/// what makes [`join_roles`] / [`split_roles`] lossless.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn parse(name: impl Into<Cow<'static, str>>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("role name must not be empty"));
        }
        if name.contains(ROLE_SEPARATOR) {
            return Err(DomainError::validation(format!(
                "role name must not contain '{ROLE_SEPARATOR}'"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Role {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.0.into_owned()
    }
}

/// Flatten a role set into one claim value (`"admin;editor"`).
pub fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(&ROLE_SEPARATOR.to_string())
}

/// Inverse of [`join_roles`]. An empty claim value means "no roles".
pub fn split_roles(value: &str) -> DomainResult<Vec<Role>> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(ROLE_SEPARATOR)
        .map(|name| Role::parse(name.to_string()))
        .collect()
}

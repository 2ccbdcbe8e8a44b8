//! Mapping of typed failures onto `ApiResult` error bodies.
//!
//! Auth/token failures are 401, validation and duplicates are 400, missing
//! records are 404 and store outages are 503.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use eshop_auth::AuthError;
use eshop_core::{ApiResult, DomainError};
use eshop_infra::{CatalogError, QueryError};

/// Message for every failed sign-in that is not a lockout, so callers cannot
/// probe which identifiers exist.
pub const SIGN_IN_FAILED: &str = "Incorrect user name or password";

pub fn api_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(ApiResult::<()>::error(message))).into_response()
}

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::NotFound => api_error(StatusCode::NOT_FOUND, "User not found"),
        AuthError::InvalidCredential => api_error(StatusCode::UNAUTHORIZED, SIGN_IN_FAILED),
        AuthError::Locked => api_error(StatusCode::UNAUTHORIZED, "Account is locked out"),
        AuthError::Token(e) => api_error(StatusCode::UNAUTHORIZED, e.to_string()),
        AuthError::DuplicateIdentifier => api_error(StatusCode::BAD_REQUEST, "User name already exists"),
        AuthError::DuplicateEmail => api_error(StatusCode::BAD_REQUEST, "Email already exists"),
        AuthError::CreationFailed(msg) => {
            api_error(StatusCode::BAD_REQUEST, format!("Registration failed: {msg}"))
        }
        AuthError::Validation(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        AuthError::Unavailable(msg) => {
            tracing::warn!(error = %msg, "credential store unavailable");
            api_error(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
        }
        AuthError::Signing(msg) => {
            tracing::error!(error = %msg, "token signing failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Token could not be issued")
        }
    }
}

/// Sign-in failures: an unknown identifier looks exactly like a wrong secret.
pub fn sign_in_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::NotFound => auth_error_to_response(AuthError::InvalidCredential),
        other => auth_error_to_response(other),
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::NotFound => api_error(StatusCode::NOT_FOUND, "Product not found"),
        CatalogError::Validation(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        CatalogError::Unavailable(msg) => {
            tracing::warn!(error = %msg, "catalog unavailable");
            api_error(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
        }
    }
}

pub fn query_error_to_response(err: QueryError) -> axum::response::Response {
    match err {
        QueryError::Rejected(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        QueryError::Unavailable(_) => api_error(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable"),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::NotFound => api_error(StatusCode::NOT_FOUND, "Not found"),
        DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
            api_error(StatusCode::BAD_REQUEST, msg)
        }
    }
}

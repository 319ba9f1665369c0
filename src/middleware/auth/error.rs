//! Rejections produced by the auth middleware.
//!
//! The response body is a fixed message per kind; the detailed reason only
//! goes to the log.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use super::claims::ClaimsError;
use super::policy::PolicyDenial;
use crate::services::auth::VerifyError;

#[derive(Debug, Error)]
pub enum Unauthenticated {
    #[error("authorization header missing")]
    MissingHeader,
    #[error("authorization header is not valid ascii")]
    InvalidHeader,
    #[error("bearer token is empty")]
    EmptyToken,
    #[error("token verification timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Rejected(#[from] VerifyError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] Unauthenticated),
    #[error("forbidden: {0}")]
    Forbidden(#[from] PolicyDenial),
    #[error("authentication misconfigured: {0}")]
    MisconfiguredAuth(String),
    #[error("claims decode failed: {0}")]
    ClaimsDecode(#[from] ClaimsError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::MisconfiguredAuth(_) | AuthError::ClaimsDecode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated(Unauthenticated::MissingHeader) => "missing bearer token",
            AuthError::Unauthenticated(_) => "invalid token",
            AuthError::Forbidden(_) => "insufficient permissions",
            AuthError::MisconfiguredAuth(_) => "authentication is not configured",
            AuthError::ClaimsDecode(_) => "unable to read token claims",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}

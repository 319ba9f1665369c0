/*
 * Responsibility
 * - resource handler 共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / {"error": "..."})
 * - repo / service / id codec のエラーを統一的に変換
 *
 * 認証・認可のエラーは middleware::auth::AuthError が担当する
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::RepoError;
use crate::services::id_codec::IdCodecError;
use crate::services::product::ProductError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::BadRequest(message) | AppError::Conflict(message) => message,
            AppError::NotFound { resource } => format!("{resource} not found"),
            AppError::Internal => "internal server error".into(),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict => AppError::conflict("already exists"),
            RepoError::Db(err) => {
                tracing::error!(error = %err, "database error");
                AppError::Internal
            }
        }
    }
}

impl From<ProductError> for AppError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::EmptyName | ProductError::InvalidPrice => AppError::bad_request(e.to_string()),
            ProductError::NotFound => AppError::not_found("product"),
            ProductError::Repo(RepoError::Conflict) => {
                AppError::conflict("a product with this name already exists")
            }
            ProductError::Repo(err) => err.into(),
        }
    }
}

impl From<IdCodecError> for AppError {
    fn from(e: IdCodecError) -> Self {
        if e.is_client_error() {
            // Client supplied a malformed public id (e.g. /products/{id})
            AppError::bad_request("invalid id")
        } else {
            // These indicate server-side config / programming errors
            tracing::error!(error = %e, "id codec failure");
            AppError::Internal
        }
    }
}

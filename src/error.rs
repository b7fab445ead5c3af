use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{
    auth::{jwt::TokenError, password::HashError},
    users::repo::StoreError,
};

/// Why a caller could not be authenticated.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("missing authorization token")]
    MissingCredential,
    #[error("invalid token")]
    InvalidToken,
    #[error("token has expired")]
    ExpiredToken,
    #[error("invalid token signature")]
    BadSignature,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid password")]
    InvalidPassword,
}

/// Errors surfaced by the account service and HTTP layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authentication(AuthFailure),
    #[error("user is not authorized to access this resource")]
    Forbidden,
    #[error("user not found")]
    NotFound,
    #[error("duplicate user entry")]
    Conflict,
    #[error("foreign key violation (invalid user reference?)")]
    ForeignKey,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::ForeignKey => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; internal causes stay in the logs.
    pub fn message(&self) -> String {
        match self {
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(cause) => error!(error = %cause, "internal error"),
            AppError::Authentication(reason) => warn!(%reason, "authentication failed"),
            AppError::Forbidden => warn!("forbidden resource access"),
            _ => {}
        }
        let body = Json(json!({ "error": self.message() }));
        (self.status_code(), body).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Missing => AppError::Authentication(AuthFailure::MissingCredential),
            TokenError::Invalid => AppError::Authentication(AuthFailure::InvalidToken),
            TokenError::Expired => AppError::Authentication(AuthFailure::ExpiredToken),
            TokenError::Signature => AppError::Authentication(AuthFailure::BadSignature),
            TokenError::Signing(cause) => AppError::Internal(cause),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEntry => AppError::Conflict,
            StoreError::ForeignKeyViolation => AppError::ForeignKey,
            StoreError::NotFound => AppError::NotFound,
            StoreError::Hashing(e) => AppError::Internal(e.to_string()),
            StoreError::Storage(cause) => AppError::Internal(cause),
        }
    }
}

impl From<HashError> for AppError {
    fn from(e: HashError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        warn!(error = %e.body_text(), "failed to read payload");
        AppError::Validation("failed to read payload".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                AppError::Authentication(AuthFailure::ExpiredToken),
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::Forbidden, StatusCode::FORBIDDEN),
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (AppError::Conflict, StatusCode::CONFLICT),
            (AppError::ForeignKey, StatusCode::BAD_REQUEST),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err:?}");
        }
    }

    #[test]
    fn internal_cause_is_not_exposed() {
        let err = AppError::Internal("connection refused at 10.0.0.3".into());
        assert_eq!(err.message(), "internal server error");
    }

    #[test]
    fn store_errors_map_to_outward_kinds() {
        assert!(matches!(AppError::from(StoreError::DuplicateEntry), AppError::Conflict));
        assert!(matches!(AppError::from(StoreError::NotFound), AppError::NotFound));
        assert!(matches!(
            AppError::from(StoreError::ForeignKeyViolation),
            AppError::ForeignKey
        ));
        assert!(matches!(
            AppError::from(StoreError::Storage("x".into())),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn token_errors_keep_their_specific_kind() {
        assert!(matches!(
            AppError::from(TokenError::Missing),
            AppError::Authentication(AuthFailure::MissingCredential)
        ));
        assert!(matches!(
            AppError::from(TokenError::Signature),
            AppError::Authentication(AuthFailure::BadSignature)
        ));
        assert!(matches!(
            AppError::from(TokenError::Expired),
            AppError::Authentication(AuthFailure::ExpiredToken)
        ));
    }

    #[tokio::test]
    async fn response_body_carries_single_error_field() {
        let res = AppError::Authentication(AuthFailure::InvalidCredentials).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "invalid email or password" }));
    }
}

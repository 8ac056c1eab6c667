//! Application error handling
//!
//! Every handler returns `ApiResult<T>`. `ApiError` is the single boundary
//! that maps a failure kind to a status code and a `{"error": message}` body.

use crate::auth::TokenError;
use crate::media::MediaError;
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error type that can be converted to HTTP responses
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    /// Token verified but the user it names no longer exists
    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_)
            | ApiError::InvalidToken
            | ApiError::ExpiredToken
            | ApiError::UserNotFound => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upload(_) | ApiError::Internal(_) | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::ExpiredToken,
            TokenError::Invalid(_) | TokenError::WrongType => ApiError::InvalidToken,
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        ApiError::Upload(err.to_string())
    }
}

// Extractor rejections reach clients through the same `{error}` body
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(err) => {
                error!(error = ?err, "Internal error");
                "An internal error occurred".to_string()
            }
            ApiError::Database(err) => {
                error!(error = ?err, "Database error");
                "A database error occurred".to_string()
            }
            ApiError::Upload(reason) => {
                error!(%reason, "Upload error");
                self.to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ApiError::Validation("bad".into()), StatusCode::BAD_REQUEST)]
    #[case(ApiError::Unauthorized("no token".into()), StatusCode::UNAUTHORIZED)]
    #[case(ApiError::InvalidToken, StatusCode::UNAUTHORIZED)]
    #[case(ApiError::ExpiredToken, StatusCode::UNAUTHORIZED)]
    #[case(ApiError::UserNotFound, StatusCode::UNAUTHORIZED)]
    #[case(ApiError::Forbidden("not yours".into()), StatusCode::FORBIDDEN)]
    #[case(ApiError::NotFound("gone".into()), StatusCode::NOT_FOUND)]
    #[case(ApiError::Conflict("dup".into()), StatusCode::CONFLICT)]
    #[case(ApiError::Upload("host down".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(ApiError::Internal(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_status_mapping(#[case] error: ApiError, #[case] expected: StatusCode) {
        assert_eq!(error.into_response().status(), expected);
    }

    #[tokio::test]
    async fn test_body_is_error_message() {
        let response = ApiError::Conflict("You already follow this person".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "You already follow this person");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = ApiError::Internal(anyhow::anyhow!("connection string leaked")).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("connection string"));
    }

    #[test]
    fn test_token_errors_keep_their_kind() {
        assert!(matches!(ApiError::from(TokenError::Expired), ApiError::ExpiredToken));
        assert!(matches!(ApiError::from(TokenError::WrongType), ApiError::InvalidToken));
    }
}

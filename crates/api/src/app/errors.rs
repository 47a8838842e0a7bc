//! Consistent error responses.
//!
//! One sum type per handler result; every failure serializes to a JSON body
//! with an `error` field and a status from {400, 401, 403, 404, 500}.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value as JsonValue, json};
use thiserror::Error;

use bugtrackd_auth::password::PasswordError;
use bugtrackd_auth::{AuthzError, TokenError};
use bugtrackd_core::DomainError;
use bugtrackd_infra::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed/missing input; carries the field-level messages verbatim.
    #[error("validation failed")]
    Validation(Vec<String>),

    #[error("unauthorized")]
    Unauthorized(String),

    #[error("forbidden")]
    Forbidden(String),

    #[error("not found")]
    NotFound(String),

    /// Duplicate email and friends.
    #[error("conflict")]
    Conflict(String),

    /// Persistence/signing failure; detail is logged, never surfaced.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn validation(messages: Vec<String>) -> Self {
        Self::Validation(messages)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }
}

/// Build a `{ "error": … }` response.
pub fn json_error(status: StatusCode, error: JsonValue) -> axum::response::Response {
    (status, axum::Json(json!({ "error": error }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Validation(messages) => {
                // A single message surfaces as a string, several as an
                // array, mirroring what schema validators hand back.
                let body = if messages.len() == 1 {
                    json!(messages[0])
                } else {
                    json!(messages)
                };
                json_error(StatusCode::BAD_REQUEST, body)
            }
            ApiError::Unauthorized(message) => {
                json_error(StatusCode::UNAUTHORIZED, json!(message))
            }
            ApiError::Forbidden(message) => json_error(StatusCode::FORBIDDEN, json!(message)),
            ApiError::NotFound(message) => json_error(StatusCode::NOT_FOUND, json!(message)),
            ApiError::Conflict(message) => json_error(StatusCode::BAD_REQUEST, json!(message)),
            ApiError::Internal(detail) => {
                tracing::error!("internal error: {detail}");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!("An internal server error occurred."),
                )
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(messages) => ApiError::Validation(messages),
            DomainError::InvalidId(message) => ApiError::Validation(vec![message]),
            DomainError::NotFound => ApiError::NotFound("not found".to_string()),
            DomainError::Conflict(message) => ApiError::Conflict(message),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => {
                ApiError::Conflict("User's email already exists".to_string())
            }
            StoreError::NotFound => ApiError::NotFound("not found".to_string()),
            StoreError::Serialization(detail) | StoreError::Backend(detail) => {
                ApiError::Internal(detail)
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => {
                ApiError::Unauthorized("Unauthorized: Token has expired.".to_string())
            }
            TokenError::Invalid => {
                ApiError::Unauthorized("Unauthorized: Invalid token.".to_string())
            }
            TokenError::MissingSecret | TokenError::Signing(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        let AuthzError::Forbidden(_) = err;
        ApiError::Forbidden("Forbidden: You do not have permission to perform this action.".to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

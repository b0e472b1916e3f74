use super::auth::AuthError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

/// JSON body written for every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ErrorBody {
    pub errors: String,
}

#[must_use]
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            errors: message.into(),
        }),
    )
        .into_response()
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(&'static str),
    Conflict(&'static str),
    Auth(AuthError),
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn malformed_body() -> Self {
        Self::BadRequest("malformed request body".to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConflictUsername => Self::Conflict("username already exists"),
            StoreError::ConflictEmail => Self::Conflict("email already exists"),
            StoreError::ConflictWorkoutName => Self::Conflict("workout name already exists"),
            StoreError::Other(err) => Self::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => error_response(StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => error_response(StatusCode::NOT_FOUND, message),
            Self::Conflict(message) => error_response(StatusCode::CONFLICT, message),
            Self::Auth(err) => err.into_response(),
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

use super::session::SessionError;
use crate::api::handlers::error::error_response;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error, warn};

pub const UNAUTHORIZED_MESSAGE: &str = "Invalid Credentials";
pub const FORBIDDEN_MESSAGE: &str = "Forbidden";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("session is not authenticated")]
    NotAuthenticated,
    #[error("session carries no roles")]
    MissingRoles,
    #[error("session carries no user id")]
    MissingUserId,
    #[error("user {caller} may not access resources owned by {requested}")]
    OwnerMismatch { caller: String, requested: String },
    #[error("caller lacks role {0}")]
    MissingRole(String),
    #[error("request context missing from the middleware chain")]
    MissingRequestContext,
    #[error("invalid credentials")]
    InvalidCredentials,
}

impl AuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Session(_) | Self::MissingRequestContext | Self::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotAuthenticated
            | Self::MissingRoles
            | Self::MissingUserId
            | Self::OwnerMismatch { .. }
            | Self::MissingRole(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Log the failure at the severity its class calls for.
    pub fn log(&self, request_id: &str) {
        match self {
            Self::Session(err) => {
                warn!(request_id, "Failed to decode session: {err}");
            }
            Self::NotAuthenticated | Self::MissingRoles | Self::MissingUserId => {
                warn!(target: "security", request_id, "Rejected session: {self}");
            }
            Self::OwnerMismatch { caller, requested } => {
                warn!(
                    target: "security",
                    request_id,
                    session_user_id = %caller,
                    client_user_id = %requested,
                    "Authorization denied"
                );
            }
            Self::MissingRole(role) => {
                warn!(target: "security", request_id, role = %role, "Authorization denied");
            }
            Self::MissingRequestContext => {
                error!(request_id, "Request context missing; middleware chain is misordered");
            }
            Self::InvalidCredentials => {
                debug!(request_id, "Invalid credentials");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::UNAUTHORIZED {
            UNAUTHORIZED_MESSAGE
        } else {
            FORBIDDEN_MESSAGE
        };
        error_response(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_errors_are_unauthorized() {
        for err in [
            SessionError::MissingCookie,
            SessionError::TamperedCookie,
            SessionError::Expired,
        ] {
            assert_eq!(AuthError::from(err).status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(
            AuthError::MissingRequestContext.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_claim_and_policy_errors_are_forbidden() {
        for err in [
            AuthError::NotAuthenticated,
            AuthError::MissingRoles,
            AuthError::MissingUserId,
            AuthError::OwnerMismatch {
                caller: "user_1".into(),
                requested: "user_2".into(),
            },
            AuthError::MissingRole("ADMIN".into()),
        ] {
            assert_eq!(err.status(), StatusCode::FORBIDDEN);
        }
    }
}

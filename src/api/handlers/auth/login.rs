use super::error::AuthError;
use crate::api::{
    context::RequestContext,
    handlers::{
        error::{ApiError, ErrorBody},
        AppState,
    },
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[utoipa::path(
    post,
    path= "/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 204, description = "Session hydrated, cookie set"),
        (status = 400, description = "Missing username or password", body = ErrorBody),
        (status = 401, description = "Invalid credentials or session cookie", body = ErrorBody),
    ),
    tag= "auth"
)]
// axum handler for login
pub async fn login(
    Extension(state): Extension<AppState>,
    context: Option<Extension<RequestContext>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::malformed_body())?;

    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let request_id = context
        .as_deref()
        .map_or("none", RequestContext::request_id);

    let Some(record) = state.users.get_user_by_username(&request.username).await? else {
        let err = AuthError::InvalidCredentials;
        err.log(request_id);
        return Err(err.into());
    };

    match state
        .credentials
        .matches(&record.credential, &request.password)
    {
        Ok(true) => {}
        Ok(false) => {
            warn!(request_id, user_id = %record.user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }
        Err(err) => {
            warn!(request_id, user_id = %record.user.id, "Failed to open credential: {err}");
            return Err(AuthError::InvalidCredentials.into());
        }
    }

    let cookies =
        state
            .sessions
            .hydrate(context.as_deref(), &record.user.id, record.user.role_names())?;

    info!(request_id, user_id = %record.user.id, "User logged in");

    Ok((StatusCode::NO_CONTENT, cookies))
}

#[utoipa::path(
    post,
    path= "/auth/logout",
    responses (
        (status = 204, description = "Session terminated"),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
    ),
    tag= "auth"
)]
// axum handler for logout; the terminate stage rewrites the cookie
pub async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

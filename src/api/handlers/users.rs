//! User registration and management.
//!
//! Registration runs behind the `establish` stage and hydrates the session with the
//! new user. Every other route runs behind `verify`, so the caller is either the
//! owner of `{user_id}` or an admin.

use super::{
    auth::{AuthError, DEFAULT_ROLE},
    error::{ApiError, ErrorBody},
    validation::{
        is_medium_password, valid_email, valid_username, ListParams, ValidationErrors,
        EMAIL_MESSAGE, PASSWORD_MESSAGE, USERNAME_MESSAGE,
    },
    AppState,
};
use crate::{
    api::context::RequestContext,
    store::{models::USER_ID_PREFIX, NewUser, User, UserChanges},
};
use anyhow::{anyhow, Context};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use ulid::Ulid;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[utoipa::path(
    post,
    path= "/users",
    request_body = CreateUserRequest,
    responses (
        (status = 201, description = "User registered, session hydrated", body = User),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 401, description = "Unreadable session cookie", body = ErrorBody),
        (status = 409, description = "Username or email already exists", body = ErrorBody),
    ),
    tag= "users"
)]
// axum handler for registration
pub async fn create_user(
    Extension(state): Extension<AppState>,
    context: Option<Extension<RequestContext>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::malformed_body())?;

    let mut errors = ValidationErrors::new("create user");
    errors.check(valid_username(&request.username), USERNAME_MESSAGE);
    errors.check(is_medium_password(&request.password), PASSWORD_MESSAGE);
    errors.check(valid_email(&request.email), EMAIL_MESSAGE);
    errors.finish()?;

    // Hydration needs the context, so check for it before anything is written.
    let Some(context) = context.as_deref() else {
        let err = AuthError::MissingRequestContext;
        err.log("none");
        return Err(err.into());
    };

    let role = state
        .users
        .get_role(DEFAULT_ROLE)
        .await?
        .ok_or_else(|| anyhow!("Role {DEFAULT_ROLE} is not seeded"))?;

    let credential = state
        .credentials
        .encrypt(&request.password)
        .context("Failed to encrypt credential")?;

    let user = state
        .users
        .insert_user(
            NewUser {
                id: format!("{USER_ID_PREFIX}{}", Ulid::new()),
                username: request.username,
                email: request.email,
                credential,
                created: Utc::now(),
            },
            &[role],
        )
        .await?;

    let cookies = state
        .sessions
        .hydrate(Some(context), &user.id, user.role_names())?;

    info!(request_id = context.request_id(), user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, cookies, Json(user)))
}

#[utoipa::path(
    get,
    path= "/users",
    params(ListParams),
    responses (
        (status = 200, description = "Users matching the filters", body = [User]),
        (status = 400, description = "Invalid query", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
    ),
    tag= "users"
)]
// axum handler for listing users
pub async fn list_users(
    Extension(state): Extension<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<User>>, ApiError> {
    let Query(params) = params.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let query = params.into_user_query()?;

    let users = state.users.list_users(&query).await?;

    Ok(Json(users))
}

#[utoipa::path(
    get,
    path= "/users/{user_id}",
    params(("user_id" = String, Path, description = "User id")),
    responses (
        (status = 200, description = "User", body = User),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    tag= "users"
)]
// axum handler for reading a user
pub async fn get_user(
    Path(user_id): Path<String>,
    Extension(state): Extension<AppState>,
) -> Result<Json<User>, ApiError> {
    state
        .users
        .get_user_by_id(&user_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("user not found"))
}

#[utoipa::path(
    patch,
    path= "/users/{user_id}",
    params(("user_id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses (
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Username or email already exists", body = ErrorBody),
    ),
    tag= "users"
)]
// axum handler for updating a user
pub async fn update_user(
    Path(user_id): Path<String>,
    Extension(state): Extension<AppState>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::malformed_body())?;

    let mut errors = ValidationErrors::new("update user");
    errors.check(
        request.username.is_some() || request.email.is_some(),
        "one of username or email is required",
    );
    if let Some(username) = &request.username {
        errors.check(valid_username(username), USERNAME_MESSAGE);
    }
    if let Some(email) = &request.email {
        errors.check(valid_email(email), EMAIL_MESSAGE);
    }
    errors.finish()?;

    let changes = UserChanges {
        username: request.username,
        email: request.email,
    };

    let user = state
        .users
        .update_user(&user_id, &changes)
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;

    info!(user_id = %user.id, "User updated");

    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path= "/users/{user_id}",
    params(("user_id" = String, Path, description = "User id")),
    responses (
        (status = 204, description = "User deleted with its workouts"),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    tag= "users"
)]
// axum handler for deleting a user
pub async fn delete_user(
    Path(user_id): Path<String>,
    Extension(state): Extension<AppState>,
) -> Result<StatusCode, ApiError> {
    if state.users.delete_user(&user_id).await? {
        info!(user_id, "User deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("user not found"))
    }
}

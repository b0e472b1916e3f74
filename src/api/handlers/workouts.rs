//! Workout CRUD scoped to `/users/{user_id}/workouts`.

use super::{
    error::{ApiError, ErrorBody},
    validation::{check_workout, ListParams, ValidationErrors},
    AppState,
};
use crate::store::{models::WORKOUT_ID_PREFIX, Exercise, Workout};
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

#[derive(Debug, Deserialize, ToSchema)]
pub struct WorkoutRequest {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "calendarName", default)]
    pub calendar_name: Option<String>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl WorkoutRequest {
    fn validate(&self, request: &'static str) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new(request);
        check_workout(&mut errors, &self.name, &self.exercises);
        errors.finish()
    }
}

async fn ensure_user(state: &AppState, user_id: &str) -> Result<(), ApiError> {
    state
        .users
        .get_user_by_id(user_id)
        .await?
        .map(|_| ())
        .ok_or(ApiError::NotFound("user not found"))
}

#[utoipa::path(
    post,
    path= "/users/{user_id}/workouts",
    params(("user_id" = String, Path, description = "User id")),
    request_body = WorkoutRequest,
    responses (
        (status = 201, description = "Workout created", body = Workout),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Workout name already exists", body = ErrorBody),
    ),
    tag= "workouts"
)]
// axum handler for creating a workout
pub async fn create_workout(
    Path(user_id): Path<String>,
    Extension(state): Extension<AppState>,
    payload: Result<Json<WorkoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::malformed_body())?;
    request.validate("create workout")?;

    ensure_user(&state, &user_id).await?;

    let now = Utc::now();
    let workout = Workout {
        id: format!("{WORKOUT_ID_PREFIX}{}", Ulid::new()),
        name: request.name,
        user_id,
        calendar_name: request.calendar_name,
        created: now,
        updated: now,
        exercises: request.exercises,
    };

    state.workouts.insert_workout(&workout).await?;

    info!(user_id = %workout.user_id, workout_id = %workout.id, "Workout created");

    Ok((StatusCode::CREATED, Json(workout)))
}

#[utoipa::path(
    get,
    path= "/users/{user_id}/workouts",
    params(("user_id" = String, Path, description = "User id"), ListParams),
    responses (
        (status = 200, description = "Workouts of the user", body = [Workout]),
        (status = 400, description = "Invalid query", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    tag= "workouts"
)]
// axum handler for listing workouts
pub async fn list_workouts(
    Path(user_id): Path<String>,
    Extension(state): Extension<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Workout>>, ApiError> {
    let Query(params) = params.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let query = params.into_workout_query()?;

    ensure_user(&state, &user_id).await?;

    let workouts = state.workouts.list_workouts(&user_id, &query).await?;

    Ok(Json(workouts))
}

#[utoipa::path(
    get,
    path= "/users/{user_id}/workouts/{workout_id}",
    params(
        ("user_id" = String, Path, description = "User id"),
        ("workout_id" = String, Path, description = "Workout id")
    ),
    responses (
        (status = 200, description = "Workout", body = Workout),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Workout not found", body = ErrorBody),
    ),
    tag= "workouts"
)]
// axum handler for reading a workout
pub async fn get_workout(
    Path((user_id, workout_id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
) -> Result<Json<Workout>, ApiError> {
    state
        .workouts
        .get_workout(&user_id, &workout_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("workout not found"))
}

#[utoipa::path(
    patch,
    path= "/users/{user_id}/workouts/{workout_id}",
    params(
        ("user_id" = String, Path, description = "User id"),
        ("workout_id" = String, Path, description = "Workout id")
    ),
    request_body = WorkoutRequest,
    responses (
        (status = 200, description = "Workout updated", body = Workout),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Workout not found", body = ErrorBody),
        (status = 409, description = "Workout name already exists", body = ErrorBody),
    ),
    tag= "workouts"
)]
// axum handler for updating a workout
pub async fn update_workout(
    Path((user_id, workout_id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
    payload: Result<Json<WorkoutRequest>, JsonRejection>,
) -> Result<Json<Workout>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::malformed_body())?;
    request.validate("update workout")?;

    let mut workout = state
        .workouts
        .get_workout(&user_id, &workout_id)
        .await?
        .ok_or(ApiError::NotFound("workout not found"))?;

    workout.name = request.name;
    workout.calendar_name = request.calendar_name;
    workout.exercises = request.exercises;

    let workout = state
        .workouts
        .update_workout(&workout)
        .await?
        .ok_or(ApiError::NotFound("workout not found"))?;

    info!(user_id, workout_id, "Workout updated");

    Ok(Json(workout))
}

#[utoipa::path(
    delete,
    path= "/users/{user_id}/workouts/{workout_id}",
    params(
        ("user_id" = String, Path, description = "User id"),
        ("workout_id" = String, Path, description = "Workout id")
    ),
    responses (
        (status = 204, description = "Workout deleted"),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Workout not found", body = ErrorBody),
    ),
    tag= "workouts"
)]
// axum handler for deleting a workout
pub async fn delete_workout(
    Path((user_id, workout_id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
) -> Result<StatusCode, ApiError> {
    if state.workouts.delete_workout(&user_id, &workout_id).await? {
        info!(user_id, workout_id, "Workout deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("workout not found"))
    }
}

use super::handlers::{
    auth::login,
    error::ErrorBody,
    health, users,
    validation::ListParams,
    workouts,
};
use crate::store::{Exercise, Muscle, Role, Set, User, Workout};
use utoipa::{
    openapi::{License, Tag},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        login::login,
        login::logout,
        users::create_user,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        workouts::create_workout,
        workouts::list_workouts,
        workouts::get_workout,
        workouts::update_workout,
        workouts::delete_workout,
    ),
    components(schemas(
        ErrorBody,
        health::Health,
        login::LoginRequest,
        users::CreateUserRequest,
        users::UpdateUserRequest,
        workouts::WorkoutRequest,
        User,
        Role,
        Workout,
        Exercise,
        Muscle,
        Set,
    ))
)]
struct ApiDoc;

/// `OpenAPI` document served at `/api-docs/openapi.json`.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut openapi = ApiDoc::openapi();

    // Use Cargo.toml metadata for the title, version and license.
    openapi.info.title = env!("CARGO_PKG_NAME").to_string();
    openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    openapi.info.license = cargo_license();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Session login and logout".to_string());
    let mut users_tag = Tag::new("users");
    users_tag.description = Some("User registration and management".to_string());
    let mut workouts_tag = Tag::new("workouts");
    workouts_tag.description = Some("Workouts owned by a user".to_string());
    openapi.tags = Some(vec![auth_tag, users_tag, workouts_tag]);

    openapi
}

fn cargo_license() -> Option<License> {
    let identifier = env!("CARGO_PKG_LICENSE").trim();
    if identifier.is_empty() {
        return None;
    }
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

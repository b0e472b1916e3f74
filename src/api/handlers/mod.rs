pub mod auth;
pub mod error;
pub mod health;
pub mod users;
pub mod validation;
pub mod workouts;

use self::auth::SessionLifecycle;
use crate::{
    crypt::CredentialCipher,
    store::{UserStore, WorkoutStore},
};
use std::sync::Arc;

/// Shared handler dependencies, injected as an axum `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub workouts: Arc<dyn WorkoutStore>,
    pub credentials: Arc<CredentialCipher>,
    pub sessions: Arc<SessionLifecycle>,
}

// axum handler for /
pub async fn root() -> &'static str {
    "Hello World"
}

//! Persistence for users, roles and workouts.
//!
//! Handlers talk to the [`UserStore`] and [`WorkoutStore`] traits. [`postgres::PgStore`]
//! backs them with `sqlx`; [`memory::MemoryStore`] keeps everything in process for
//! local runs and tests.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

pub use self::models::{
    Exercise, Muscle, NewUser, Page, Role, Set, SortOrder, User, UserChanges, UserQuery,
    UserRecord, UserSortColumn, Workout, WorkoutQuery, WorkoutSortColumn,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already exists")]
    ConflictUsername,
    #[error("email already exists")]
    ConflictEmail,
    #[error("workout name already exists")]
    ConflictWorkoutName,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn get_user_by_username(&self, username: &str)
        -> Result<Option<UserRecord>, StoreError>;

    async fn get_role(&self, name: &str) -> Result<Option<Role>, StoreError>;

    /// Insert a user and grant `roles` atomically.
    async fn insert_user(&self, user: NewUser, roles: &[Role]) -> Result<User, StoreError>;

    async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>, StoreError>;

    /// Returns `None` when the user does not exist.
    async fn update_user(
        &self,
        id: &str,
        changes: &UserChanges,
    ) -> Result<Option<User>, StoreError>;

    /// Delete a user with its roles and workouts. Returns `false` when nothing was deleted.
    async fn delete_user(&self, id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait WorkoutStore: Send + Sync {
    async fn insert_workout(&self, workout: &Workout) -> Result<(), StoreError>;

    async fn list_workouts(
        &self,
        user_id: &str,
        query: &WorkoutQuery,
    ) -> Result<Vec<Workout>, StoreError>;

    async fn get_workout(
        &self,
        user_id: &str,
        workout_id: &str,
    ) -> Result<Option<Workout>, StoreError>;

    /// Replace name, calendar name and exercises. Returns `None` when the workout does not exist.
    async fn update_workout(&self, workout: &Workout) -> Result<Option<Workout>, StoreError>;

    async fn delete_workout(&self, user_id: &str, workout_id: &str) -> Result<bool, StoreError>;
}

use super::{
    models::{ADMIN_ROLE_ID, CIVILIAN_ROLE_ID},
    NewUser, Page, Role, SortOrder, StoreError, User, UserChanges, UserQuery, UserRecord,
    UserSortColumn, UserStore, Workout, WorkoutQuery, WorkoutSortColumn, WorkoutStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::{cmp::Ordering, collections::BTreeMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    roles: Vec<Role>,
    users: BTreeMap<String, UserRecord>,
    workouts: Vec<Workout>,
}

/// Process-local store. Data is lost on restart.
pub struct MemoryStore {
    state: RwLock<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store seeded with the `ADMIN` and `CIVILIAN` roles.
    #[must_use]
    pub fn new() -> Self {
        Self::with_roles(vec![
            Role {
                id: ADMIN_ROLE_ID,
                name: "ADMIN".to_string(),
            },
            Role {
                id: CIVILIAN_ROLE_ID,
                name: "CIVILIAN".to_string(),
            },
        ])
    }

    #[must_use]
    pub fn with_roles(roles: Vec<Role>) -> Self {
        Self {
            state: RwLock::new(State {
                roles,
                ..State::default()
            }),
        }
    }

    /// Grant an existing role to an existing user. Returns `false` if either is unknown.
    pub async fn grant_role(&self, user_id: &str, role_name: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(role) = state.roles.iter().find(|r| r.name == role_name).cloned() else {
            return false;
        };
        let Some(record) = state.users.get_mut(user_id) else {
            return false;
        };
        if !record.user.roles.contains(&role) {
            record.user.roles.push(role);
            record.user.updated = Utc::now();
        }
        true
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    let offset = usize::try_from(page.offset).unwrap_or(0);
    let limit = usize::try_from(page.limit).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

fn ordered(ordering: Ordering, sort: SortOrder) -> Ordering {
    match sort {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn compare_users(a: &User, b: &User, column: UserSortColumn) -> Ordering {
    match column {
        UserSortColumn::Id => a.id.cmp(&b.id),
        UserSortColumn::Username => a.username.cmp(&b.username),
        UserSortColumn::Email => a.email.cmp(&b.email),
        UserSortColumn::Created => a.created.cmp(&b.created),
        UserSortColumn::Updated => a.updated.cmp(&b.updated),
    }
}

fn compare_workouts(a: &Workout, b: &Workout, column: WorkoutSortColumn) -> Ordering {
    match column {
        WorkoutSortColumn::Id => a.id.cmp(&b.id),
        WorkoutSortColumn::Name => a.name.cmp(&b.name),
        WorkoutSortColumn::Created => a.created.cmp(&b.created),
        WorkoutSortColumn::Updated => a.updated.cmp(&b.updated),
    }
}

fn check_user_conflicts(
    state: &State,
    skip_id: Option<&str>,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<(), StoreError> {
    for record in state.users.values() {
        if Some(record.user.id.as_str()) == skip_id {
            continue;
        }
        if username == Some(record.user.username.as_str()) {
            return Err(StoreError::ConflictUsername);
        }
        if email == Some(record.user.email.as_str()) {
            return Err(StoreError::ConflictEmail);
        }
    }
    Ok(())
}

fn check_workout_conflict(state: &State, workout: &Workout) -> Result<(), StoreError> {
    let taken = state
        .workouts
        .iter()
        .any(|w| w.user_id == workout.user_id && w.name == workout.name && w.id != workout.id);
    if taken {
        Err(StoreError::ConflictWorkoutName)
    } else {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.get(id).map(|record| record.user.clone()))
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|record| record.user.username == username)
            .cloned())
    }

    async fn get_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let state = self.state.read().await;
        Ok(state.roles.iter().find(|role| role.name == name).cloned())
    }

    async fn insert_user(&self, user: NewUser, roles: &[Role]) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        check_user_conflicts(&state, None, Some(&user.username), Some(&user.email))?;

        let record = UserRecord {
            user: User {
                id: user.id.clone(),
                username: user.username,
                email: user.email,
                created: user.created,
                updated: user.created,
                roles: roles.to_vec(),
            },
            credential: user.credential,
        };
        let created = record.user.clone();
        state.users.insert(user.id, record);

        Ok(created)
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>, StoreError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .map(|record| &record.user)
            .filter(|user| query.id.as_ref().map_or(true, |id| &user.id == id))
            .filter(|user| {
                query
                    .username
                    .as_ref()
                    .map_or(true, |username| &user.username == username)
            })
            .filter(|user| query.email.as_ref().map_or(true, |email| &user.email == email))
            .cloned()
            .collect();

        users.sort_by(|a, b| ordered(compare_users(a, b, query.sort_column), query.sort));

        Ok(paginate(users, query.page))
    }

    async fn update_user(
        &self,
        id: &str,
        changes: &UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(id) {
            return Ok(None);
        }
        check_user_conflicts(
            &state,
            Some(id),
            changes.username.as_deref(),
            changes.email.as_deref(),
        )?;

        let Some(record) = state.users.get_mut(id) else {
            return Ok(None);
        };
        if let Some(username) = &changes.username {
            record.user.username.clone_from(username);
        }
        if let Some(email) = &changes.email {
            record.user.email.clone_from(email);
        }
        record.user.updated = Utc::now();

        Ok(Some(record.user.clone()))
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let removed = state.users.remove(id).is_some();
        if removed {
            state.workouts.retain(|workout| workout.user_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl WorkoutStore for MemoryStore {
    async fn insert_workout(&self, workout: &Workout) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        check_workout_conflict(&state, workout)?;
        state.workouts.push(workout.clone());
        Ok(())
    }

    async fn list_workouts(
        &self,
        user_id: &str,
        query: &WorkoutQuery,
    ) -> Result<Vec<Workout>, StoreError> {
        let state = self.state.read().await;
        let mut workouts: Vec<Workout> = state
            .workouts
            .iter()
            .filter(|workout| workout.user_id == user_id)
            .cloned()
            .collect();

        workouts.sort_by(|a, b| ordered(compare_workouts(a, b, query.sort_column), query.sort));

        Ok(paginate(workouts, query.page))
    }

    async fn get_workout(
        &self,
        user_id: &str,
        workout_id: &str,
    ) -> Result<Option<Workout>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .workouts
            .iter()
            .find(|workout| workout.user_id == user_id && workout.id == workout_id)
            .cloned())
    }

    async fn update_workout(&self, workout: &Workout) -> Result<Option<Workout>, StoreError> {
        let mut state = self.state.write().await;
        check_workout_conflict(&state, workout)?;

        let Some(existing) = state
            .workouts
            .iter_mut()
            .find(|w| w.user_id == workout.user_id && w.id == workout.id)
        else {
            return Ok(None);
        };

        existing.name.clone_from(&workout.name);
        existing.calendar_name.clone_from(&workout.calendar_name);
        existing.exercises.clone_from(&workout.exercises);
        existing.updated = Utc::now();

        Ok(Some(existing.clone()))
    }

    async fn delete_workout(&self, user_id: &str, workout_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.workouts.len();
        state
            .workouts
            .retain(|workout| !(workout.user_id == user_id && workout.id == workout_id));
        Ok(state.workouts.len() != before)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_user(id: &str, username: &str, email: &str) -> NewUser {
        NewUser {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            credential: "sealed".to_string(),
            created: Utc::now(),
        }
    }

    fn workout(id: &str, user_id: &str, name: &str) -> Workout {
        Workout {
            id: id.to_string(),
            name: name.to_string(),
            user_id: user_id.to_string(),
            calendar_name: None,
            created: Utc::now(),
            updated: Utc::now(),
            exercises: Vec::new(),
        }
    }

    async fn civilian(store: &MemoryStore) -> Role {
        store.get_role("CIVILIAN").await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryStore::new();
        let role = civilian(&store).await;
        let user = store
            .insert_user(new_user("user_1", "alice", "alice@example.com"), &[role])
            .await
            .unwrap();
        assert_eq!(user.role_names(), vec!["CIVILIAN".to_string()]);

        let record = store.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(record.credential, "sealed");
        assert_eq!(store.get_user_by_id("user_1").await.unwrap(), Some(user));
        assert!(store.get_user_by_id("user_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_conflicts() {
        let store = MemoryStore::new();
        store
            .insert_user(new_user("user_1", "alice", "alice@example.com"), &[])
            .await
            .unwrap();

        let err = store
            .insert_user(new_user("user_2", "alice", "other@example.com"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConflictUsername));

        let err = store
            .insert_user(new_user("user_2", "bob", "alice@example.com"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConflictEmail));
    }

    #[tokio::test]
    async fn test_grant_role() {
        let store = MemoryStore::new();
        store
            .insert_user(new_user("user_1", "alice", "alice@example.com"), &[])
            .await
            .unwrap();

        assert!(store.grant_role("user_1", "ADMIN").await);
        assert!(store.grant_role("user_1", "ADMIN").await);
        assert!(!store.grant_role("user_1", "ROOT").await);
        assert!(!store.grant_role("user_9", "ADMIN").await);

        let user = store.get_user_by_id("user_1").await.unwrap().unwrap();
        assert_eq!(user.role_names(), vec!["ADMIN".to_string()]);
    }

    #[tokio::test]
    async fn test_list_users_sort_filter_page() {
        let store = MemoryStore::new();
        for (id, name) in [("user_1", "carol"), ("user_2", "alice"), ("user_3", "bob")] {
            store
                .insert_user(new_user(id, name, &format!("{name}@example.com")), &[])
                .await
                .unwrap();
        }

        let query = UserQuery {
            sort_column: UserSortColumn::Username,
            sort: SortOrder::Desc,
            ..UserQuery::default()
        };
        let names: Vec<_> = store
            .list_users(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["carol", "bob", "alice"]);

        let query = UserQuery {
            page: Page {
                limit: 1,
                offset: 1,
            },
            ..UserQuery::default()
        };
        let ids: Vec<_> = store
            .list_users(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec!["user_2"]);

        let query = UserQuery {
            email: Some("bob@example.com".to_string()),
            ..UserQuery::default()
        };
        assert_eq!(store.list_users(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_user() {
        let store = MemoryStore::new();
        store
            .insert_user(new_user("user_1", "alice", "alice@example.com"), &[])
            .await
            .unwrap();
        store
            .insert_user(new_user("user_2", "bob", "bob@example.com"), &[])
            .await
            .unwrap();

        let changes = UserChanges {
            username: Some("bob".to_string()),
            email: None,
        };
        assert!(matches!(
            store.update_user("user_1", &changes).await,
            Err(StoreError::ConflictUsername)
        ));

        let changes = UserChanges {
            username: Some("alicia".to_string()),
            email: None,
        };
        let updated = store.update_user("user_1", &changes).await.unwrap().unwrap();
        assert_eq!(updated.username, "alicia");
        assert_eq!(updated.email, "alice@example.com");
        assert!(store.update_user("user_9", &changes).await.unwrap().is_none());

        store.insert_workout(&workout("work_1", "user_1", "legs")).await.unwrap();
        assert!(store.delete_user("user_1").await.unwrap());
        assert!(!store.delete_user("user_1").await.unwrap());
        assert!(store
            .get_workout("user_1", "work_1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_workout_lifecycle() {
        let store = MemoryStore::new();
        store.insert_workout(&workout("work_1", "user_1", "legs")).await.unwrap();
        store.insert_workout(&workout("work_2", "user_1", "arms")).await.unwrap();
        store.insert_workout(&workout("work_3", "user_2", "legs")).await.unwrap();

        assert!(matches!(
            store.insert_workout(&workout("work_4", "user_1", "legs")).await,
            Err(StoreError::ConflictWorkoutName)
        ));

        let query = WorkoutQuery {
            sort_column: WorkoutSortColumn::Name,
            ..WorkoutQuery::default()
        };
        let names: Vec<_> = store
            .list_workouts("user_1", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["arms", "legs"]);

        let mut renamed = workout("work_2", "user_1", "legs");
        assert!(matches!(
            store.update_workout(&renamed).await,
            Err(StoreError::ConflictWorkoutName)
        ));
        renamed.name = "biceps".to_string();
        let updated = store.update_workout(&renamed).await.unwrap().unwrap();
        assert_eq!(updated.name, "biceps");

        assert!(store.get_workout("user_2", "work_2").await.unwrap().is_none());
        assert!(store.delete_workout("user_1", "work_2").await.unwrap());
        assert!(!store.delete_workout("user_1", "work_2").await.unwrap());
    }
}

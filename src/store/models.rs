use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

pub const USER_ID_PREFIX: &str = "user_";
pub const WORKOUT_ID_PREFIX: &str = "work_";

pub const ADMIN_ROLE_ID: i32 = 1;
pub const CIVILIAN_ROLE_ID: i32 = 2;

pub const MUSCLE_GROUPS: [&str; 7] = ["Arms", "Back", "Chest", "Core", "Heart", "Legs", "Shoulders"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: i32,
    pub name: String,
}

/// Public view of a user. Carries no credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub roles: Vec<Role>,
}

impl User {
    #[must_use]
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|role| role.name.clone()).collect()
    }
}

/// User row together with its encrypted credential, used only by login.
#[derive(Clone)]
pub struct UserRecord {
    pub user: User,
    pub credential: String,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("user", &self.user)
            .field("credential", &"***")
            .finish()
    }
}

#[derive(Clone)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub credential: String,
    pub created: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Workout {
    pub id: String,
    pub name: String,
    pub user_id: String,
    #[serde(
        rename = "calendarName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub calendar_name: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub exercises: Vec<Exercise>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Exercise {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub muscles: Vec<Muscle>,
    #[serde(default)]
    pub sets: Vec<Set>,
    #[serde(rename = "superSets", default)]
    pub super_sets: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Muscle {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "muscleGroup", default)]
    pub muscle_group: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Set {
    pub weight: f32,
    pub reps: i8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("invalid sort order: {value}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UserSortColumn {
    #[default]
    Id,
    Username,
    Email,
    Created,
    Updated,
}

impl UserSortColumn {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::Email => "email",
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

impl FromStr for UserSortColumn {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "id" => Ok(Self::Id),
            "username" => Ok(Self::Username),
            "email" => Ok(Self::Email),
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            _ => Err(format!("invalid sort column: {value}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorkoutSortColumn {
    #[default]
    Id,
    Name,
    Created,
    Updated,
}

impl WorkoutSortColumn {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

impl FromStr for WorkoutSortColumn {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            _ => Err(format!("invalid sort column: {value}")),
        }
    }
}

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub sort_column: UserSortColumn,
    pub sort: SortOrder,
    pub page: Page,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkoutQuery {
    pub sort_column: WorkoutSortColumn,
    pub sort: SortOrder,
    pub page: Page,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_has_no_credential() {
        let user = User {
            id: "user_1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            created: Utc::now(),
            updated: Utc::now(),
            roles: vec![Role {
                id: 2,
                name: "CIVILIAN".to_string(),
            }],
        };
        let json = serde_json::to_value(&user).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("credential"));
        assert_eq!(user.role_names(), vec!["CIVILIAN".to_string()]);
    }

    #[test]
    fn test_user_record_debug_redacts_credential() {
        let record = UserRecord {
            user: User {
                id: "user_1".to_string(),
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                created: Utc::now(),
                updated: Utc::now(),
                roles: Vec::new(),
            },
            credential: "c2VjcmV0".to_string(),
        };
        assert!(!format!("{record:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn test_workout_wire_names() {
        let json = serde_json::json!({
            "name": "push",
            "muscles": [{"name": "pec", "muscleGroup": "Chest"}],
            "sets": [{"weight": 60.0, "reps": 8}],
            "superSets": ["dips"]
        });
        let exercise: Exercise = serde_json::from_value(json).unwrap();
        assert_eq!(exercise.muscles[0].muscle_group, "Chest");
        assert_eq!(exercise.super_sets, vec!["dips".to_string()]);
        assert_eq!(exercise.sets[0].reps, 8);
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("DESC".parse::<SortOrder>(), Ok(SortOrder::Desc));
        assert_eq!("asc".parse::<SortOrder>(), Ok(SortOrder::Asc));
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!(
            "username".parse::<UserSortColumn>(),
            Ok(UserSortColumn::Username)
        );
        assert!("password".parse::<UserSortColumn>().is_err());
        assert_eq!("name".parse::<WorkoutSortColumn>(), Ok(WorkoutSortColumn::Name));
        assert!("id; DROP TABLE".parse::<WorkoutSortColumn>().is_err());
    }
}

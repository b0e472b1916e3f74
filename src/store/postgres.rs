use super::{
    Exercise, NewUser, Role, StoreError, User, UserChanges, UserQuery, UserRecord, UserStore,
    Workout, WorkoutQuery, WorkoutStore,
};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::Json,
    Connection, PgPool, Postgres, QueryBuilder, Row,
};
use std::time::Duration;
use tracing::{info_span, Instrument, Span};

const USER_COLUMNS: &str = "id, username, email, created, updated";
const WORKOUT_COLUMNS: &str = "id, name, user_id, calendar_name, created, updated, exercises";

/// `sqlx` backed store for the `sandbox` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small connection pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(dsn: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool))
    }

    async fn attach_roles(&self, users: &mut [User]) -> Result<(), StoreError> {
        if users.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = users.iter().map(|user| user.id.clone()).collect();
        let query = r"
            SELECT ur.user_id, r.id, r.name
            FROM sandbox.user_role ur
            INNER JOIN sandbox.role r ON r.id = ur.role_id
            WHERE ur.user_id = ANY($1)
            ORDER BY r.id
        ";
        let rows = sqlx::query(query)
            .bind(&ids)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("Failed to fetch user roles")?;

        for row in rows {
            let user_id: String = row.try_get("user_id").context("Failed to read user_id")?;
            let role = Role {
                id: row.try_get("id").context("Failed to read role id")?,
                name: row.try_get("name").context("Failed to read role name")?,
            };
            if let Some(user) = users.iter_mut().find(|user| user.id == user_id) {
                user.roles.push(role);
            }
        }

        Ok(())
    }
}

fn query_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Map unique violations onto the conflict they represent.
fn classify(err: sqlx::Error, context: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().is_some_and(|code| code.as_ref() == "23505") {
            match db_err.constraint() {
                Some("u_username") => return StoreError::ConflictUsername,
                Some("u_email") => return StoreError::ConflictEmail,
                Some("u_user_name") => return StoreError::ConflictWorkoutName,
                _ => {}
            }
        }
    }
    StoreError::Other(anyhow::Error::new(err).context(context))
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        created: row.try_get("created")?,
        updated: row.try_get("updated")?,
        roles: Vec::new(),
    })
}

fn workout_from_row(row: &PgRow) -> Result<Workout, sqlx::Error> {
    let Json(exercises): Json<Vec<Exercise>> = row.try_get("exercises")?;
    Ok(Workout {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        user_id: row.try_get("user_id")?,
        calendar_name: row.try_get("calendar_name")?,
        created: row.try_get("created")?,
        updated: row.try_get("updated")?,
        exercises,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("Failed to acquire database connection")?;

        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("Failed to ping database")?;

        Ok(())
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM sandbox.user WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch user by id")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut users = [user_from_row(&row).context("Failed to decode user")?];
        self.attach_roles(&mut users).await?;
        let [user] = users;

        Ok(Some(user))
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let query =
            format!("SELECT {USER_COLUMNS}, password FROM sandbox.user WHERE username = $1");
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch user by username")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let credential: String = row
            .try_get("password")
            .context("Failed to decode credential")?;
        let mut users = [user_from_row(&row).context("Failed to decode user")?];
        self.attach_roles(&mut users).await?;
        let [user] = users;

        Ok(Some(UserRecord { user, credential }))
    }

    async fn get_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let query = "SELECT id, name FROM sandbox.role WHERE name = $1";
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("Failed to fetch role")?;

        row.map(|row| -> anyhow::Result<Role> {
            Ok(Role {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            })
        })
        .transpose()
        .map_err(StoreError::from)
    }

    async fn insert_user(&self, user: NewUser, roles: &[Role]) -> Result<User, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let query = format!(
            "INSERT INTO sandbox.user (id, username, password, email, created, updated) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.credential)
            .bind(&user.email)
            .bind(user.created)
            .fetch_one(&mut *tx)
            .instrument(query_span("INSERT", &query))
            .await
            .map_err(|err| classify(err, "Failed to insert user"))?;
        let mut created = user_from_row(&row).context("Failed to decode user")?;

        let query = "INSERT INTO sandbox.user_role (user_id, role_id) VALUES ($1, $2)";
        for role in roles {
            sqlx::query(query)
                .bind(&created.id)
                .bind(role.id)
                .execute(&mut *tx)
                .instrument(query_span("INSERT", query))
                .await
                .context("Failed to insert user role")?;
        }

        tx.commit().await.context("Failed to commit user")?;

        created.roles = roles.to_vec();
        Ok(created)
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM sandbox.user WHERE TRUE"));
        if let Some(id) = &query.id {
            builder.push(" AND id = ").push_bind(id.clone());
        }
        if let Some(username) = &query.username {
            builder.push(" AND username = ").push_bind(username.clone());
        }
        if let Some(email) = &query.email {
            builder.push(" AND email = ").push_bind(email.clone());
        }
        builder.push(format!(
            " ORDER BY {} {}",
            query.sort_column.as_sql(),
            query.sort.as_sql()
        ));
        builder
            .push(" LIMIT ")
            .push_bind(query.page.limit)
            .push(" OFFSET ")
            .push_bind(query.page.offset);

        let statement = builder.sql().to_string();
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &statement))
            .await
            .context("Failed to list users")?;

        let mut users = rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode users")?;
        self.attach_roles(&mut users).await?;

        Ok(users)
    }

    async fn update_user(
        &self,
        id: &str,
        changes: &UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let query = format!(
            "UPDATE sandbox.user SET username = COALESCE($2, username), \
             email = COALESCE($3, email), updated = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(changes.username.as_deref())
            .bind(changes.email.as_deref())
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .map_err(|err| classify(err, "Failed to update user"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut users = [user_from_row(&row).context("Failed to decode user")?];
        self.attach_roles(&mut users).await?;
        let [user] = users;

        Ok(Some(user))
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        let query = "DELETE FROM sandbox.user WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl WorkoutStore for PgStore {
    async fn insert_workout(&self, workout: &Workout) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO sandbox.workout ({WORKOUT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        );
        sqlx::query(&query)
            .bind(&workout.id)
            .bind(&workout.name)
            .bind(&workout.user_id)
            .bind(workout.calendar_name.as_deref())
            .bind(workout.created)
            .bind(workout.updated)
            .bind(Json(&workout.exercises))
            .execute(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await
            .map_err(|err| classify(err, "Failed to insert workout"))?;

        Ok(())
    }

    async fn list_workouts(
        &self,
        user_id: &str,
        query: &WorkoutQuery,
    ) -> Result<Vec<Workout>, StoreError> {
        let statement = format!(
            "SELECT {WORKOUT_COLUMNS} FROM sandbox.workout WHERE user_id = $1 \
             ORDER BY {} {} LIMIT $2 OFFSET $3",
            query.sort_column.as_sql(),
            query.sort.as_sql()
        );
        let rows = sqlx::query(&statement)
            .bind(user_id)
            .bind(query.page.limit)
            .bind(query.page.offset)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &statement))
            .await
            .context("Failed to list workouts")?;

        let workouts = rows
            .iter()
            .map(workout_from_row)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode workouts")?;

        Ok(workouts)
    }

    async fn get_workout(
        &self,
        user_id: &str,
        workout_id: &str,
    ) -> Result<Option<Workout>, StoreError> {
        let query =
            format!("SELECT {WORKOUT_COLUMNS} FROM sandbox.workout WHERE id = $1 AND user_id = $2");
        let row = sqlx::query(&query)
            .bind(workout_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch workout")?;

        row.as_ref()
            .map(workout_from_row)
            .transpose()
            .context("Failed to decode workout")
            .map_err(StoreError::from)
    }

    async fn update_workout(&self, workout: &Workout) -> Result<Option<Workout>, StoreError> {
        let query = format!(
            "UPDATE sandbox.workout SET name = $3, calendar_name = $4, exercises = $5, \
             updated = NOW() WHERE id = $1 AND user_id = $2 RETURNING {WORKOUT_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(&workout.id)
            .bind(&workout.user_id)
            .bind(&workout.name)
            .bind(workout.calendar_name.as_deref())
            .bind(Json(&workout.exercises))
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .map_err(|err| classify(err, "Failed to update workout"))?;

        row.as_ref()
            .map(workout_from_row)
            .transpose()
            .context("Failed to decode workout")
            .map_err(StoreError::from)
    }

    async fn delete_workout(&self, user_id: &str, workout_id: &str) -> Result<bool, StoreError> {
        let query = "DELETE FROM sandbox.workout WHERE id = $1 AND user_id = $2";
        let result = sqlx::query(query)
            .bind(workout_id)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("Failed to delete workout")?;

        Ok(result.rows_affected() > 0)
    }
}

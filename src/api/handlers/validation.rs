//! Request validation shared by the user and workout handlers.

use super::error::ApiError;
use crate::store::{
    models::{MAX_LIMIT, MUSCLE_GROUPS},
    Exercise, Page, SortOrder, UserQuery, UserSortColumn, WorkoutQuery, WorkoutSortColumn,
};
use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;
use utoipa::IntoParams;

pub const MIN_USERNAME_LENGTH: usize = 4;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const USERNAME_MESSAGE: &str = "username must be at least four characters long";
pub const PASSWORD_MESSAGE: &str = "password must be at least 8 characters long and contain at least one number, one special character, one upper case character, and one lower case character";
pub const EMAIL_MESSAGE: &str = "invalid email";
pub const WORKOUT_NAME_MESSAGE: &str = "workout must have a name";
pub const EXERCISE_NAME_MESSAGE: &str = "exercise must have a name";
pub const MUSCLE_NAME_MESSAGE: &str = "muscle must have a name";

/// Collects every failed check so the client sees all of them at once.
#[derive(Debug)]
pub struct ValidationErrors {
    request: &'static str,
    messages: Vec<String>,
}

impl ValidationErrors {
    #[must_use]
    pub const fn new(request: &'static str) -> Self {
        Self {
            request,
            messages: Vec::new(),
        }
    }

    /// Record `message` unless `ok` holds. Repeated messages are kept once.
    pub fn check(&mut self, ok: bool, message: impl Into<String>) {
        if ok {
            return;
        }
        let message = message.into();
        if !self.messages.contains(&message) {
            self.messages.push(message);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// # Errors
    /// Returns a 400 carrying every recorded message joined with `; `.
    pub fn finish(self) -> Result<(), ApiError> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(ApiError::bad_request(format!(
                "failed to validate {} request: {}",
                self.request,
                self.messages.join("; ")
            )))
        }
    }
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[must_use]
pub fn valid_username(username: &str) -> bool {
    username.chars().count() >= MIN_USERNAME_LENGTH
}

/// At least eight characters with an upper case letter, a lower case letter, a digit and a
/// punctuation or symbol character.
#[must_use]
pub fn is_medium_password(password: &str) -> bool {
    let mut upper = false;
    let mut lower = false;
    let mut digit = false;
    let mut special = false;

    for c in password.chars() {
        if c.is_uppercase() {
            upper = true;
        } else if c.is_lowercase() {
            lower = true;
        } else if c.is_numeric() {
            digit = true;
        } else if !c.is_whitespace() && !c.is_control() && !c.is_alphanumeric() {
            special = true;
        }
    }

    password.chars().count() >= MIN_PASSWORD_LENGTH && upper && lower && digit && special
}

fn muscle_group_message() -> String {
    format!(
        "invalid muscle group. valid options: [{}]",
        MUSCLE_GROUPS.join(" ")
    )
}

/// Validate a workout body. Every exercise and muscle needs a name and each muscle a known
/// group.
pub fn check_workout(errors: &mut ValidationErrors, name: &str, exercises: &[Exercise]) {
    errors.check(!name.trim().is_empty(), WORKOUT_NAME_MESSAGE);
    for exercise in exercises {
        errors.check(!exercise.name.trim().is_empty(), EXERCISE_NAME_MESSAGE);
        for muscle in &exercise.muscles {
            errors.check(!muscle.name.trim().is_empty(), MUSCLE_NAME_MESSAGE);
            errors.check(
                MUSCLE_GROUPS.contains(&muscle.muscle_group.as_str()),
                muscle_group_message(),
            );
        }
    }
}

/// Raw list query parameters, all optional.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Exact user id filter (users only).
    pub id: Option<String>,
    /// Exact username filter (users only).
    pub username: Option<String>,
    /// Exact email filter (users only).
    pub email: Option<String>,
    pub sort_column: Option<String>,
    /// `asc` or `desc`.
    pub sort: Option<String>,
    /// 1 to 1000, default 100.
    pub limit: Option<String>,
    pub offset: Option<String>,
}

fn parse_or_default<T>(value: Option<&str>) -> Result<T, ApiError>
where
    T: FromStr<Err = String> + Default,
{
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value.parse().map_err(ApiError::BadRequest),
        None => Ok(T::default()),
    }
}

fn parse_page(limit: Option<&str>, offset: Option<&str>) -> Result<Page, ApiError> {
    let mut page = Page::default();
    if let Some(limit) = limit.map(str::trim).filter(|value| !value.is_empty()) {
        page.limit = limit
            .parse::<i64>()
            .ok()
            .filter(|limit| (1..=MAX_LIMIT).contains(limit))
            .ok_or_else(|| ApiError::bad_request("invalid limit"))?;
    }
    if let Some(offset) = offset.map(str::trim).filter(|value| !value.is_empty()) {
        page.offset = offset
            .parse::<i64>()
            .ok()
            .filter(|offset| *offset >= 0)
            .ok_or_else(|| ApiError::bad_request("invalid offset"))?;
    }
    Ok(page)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl ListParams {
    /// # Errors
    /// Returns a 400 for an unknown sort column or order, or an out of range page.
    pub fn into_user_query(self) -> Result<UserQuery, ApiError> {
        Ok(UserQuery {
            sort_column: parse_or_default::<UserSortColumn>(self.sort_column.as_deref())?,
            sort: parse_or_default::<SortOrder>(self.sort.as_deref())?,
            page: parse_page(self.limit.as_deref(), self.offset.as_deref())?,
            id: non_empty(self.id),
            username: non_empty(self.username),
            email: non_empty(self.email),
        })
    }

    /// # Errors
    /// Returns a 400 for an unknown sort column or order, or an out of range page.
    pub fn into_workout_query(self) -> Result<WorkoutQuery, ApiError> {
        Ok(WorkoutQuery {
            sort_column: parse_or_default::<WorkoutSortColumn>(self.sort_column.as_deref())?,
            sort: parse_or_default::<SortOrder>(self.sort.as_deref())?,
            page: parse_page(self.limit.as_deref(), self.offset.as_deref())?,
        })
    }
}

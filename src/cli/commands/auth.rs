//! Session and credential secrets.

use crate::{api::handlers::auth::session::DEFAULT_SESSION_MAX_AGE_SECONDS, crypt::KEY_LENGTH};
use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};

pub const ARG_SESSION_KEY: &str = "session-key";
pub const ARG_AUTH_KEY: &str = "auth-key";
pub const ARG_SESSION_MAX_AGE: &str = "session-max-age";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_ALLOWED_ORIGIN: &str = "allowed-origin";

const DEFAULT_SESSION_MAX_AGE: &str = "2592000";
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_KEY)
                .long(ARG_SESSION_KEY)
                .help("Secret used to seal the session cookie")
                .env("SANDBOX_STANDARD_SESSION_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_AUTH_KEY)
                .long(ARG_AUTH_KEY)
                .help("32 byte key used to encrypt stored credentials")
                .env("SANDBOX_AUTH_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_MAX_AGE)
                .long(ARG_SESSION_MAX_AGE)
                .help("Session cookie max age in seconds")
                .env("SANDBOX_SESSION_MAX_AGE")
                .default_value(DEFAULT_SESSION_MAX_AGE)
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (HTTPS only)")
                .env("SANDBOX_COOKIE_SECURE")
                .num_args(0..=1)
                .default_value("false")
                .default_missing_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_ALLOWED_ORIGIN)
                .long(ARG_ALLOWED_ORIGIN)
                .help("Browser origin allowed to call the API with credentials")
                .env("SANDBOX_ALLOWED_ORIGIN")
                .default_value(DEFAULT_ALLOWED_ORIGIN),
        )
}

#[derive(Debug)]
pub struct Options {
    pub session_key: SecretString,
    pub auth_key: SecretString,
    pub session_max_age: i64,
    pub cookie_secure: bool,
    pub allowed_origin: String,
}

fn secret(matches: &ArgMatches, id: &str) -> Result<SecretString> {
    matches
        .get_one::<String>(id)
        .filter(|value| !value.is_empty())
        .map(|value| SecretString::from(value.as_str()))
        .with_context(|| format!("missing required argument: --{id}"))
}

impl Options {
    /// # Errors
    /// Returns an error if a secret is missing or empty, or the auth key is not 32 bytes.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let session_key = secret(matches, ARG_SESSION_KEY)?;
        let auth_key = secret(matches, ARG_AUTH_KEY)?;

        if auth_key.expose_secret().len() != KEY_LENGTH {
            bail!("--{ARG_AUTH_KEY} must be exactly {KEY_LENGTH} bytes");
        }

        Ok(Self {
            session_key,
            auth_key,
            session_max_age: matches
                .get_one::<i64>(ARG_SESSION_MAX_AGE)
                .copied()
                .unwrap_or(DEFAULT_SESSION_MAX_AGE_SECONDS),
            cookie_secure: matches
                .get_one::<bool>(ARG_COOKIE_SECURE)
                .copied()
                .unwrap_or(false),
            allowed_origin: matches
                .get_one::<String>(ARG_ALLOWED_ORIGIN)
                .cloned()
                .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.to_string()),
        })
    }
}

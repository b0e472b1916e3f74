//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, such as starting the API server
//! with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .filter(|dsn| !dsn.is_empty())
        .cloned();

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        session_key: auth_opts.session_key,
        auth_key: auth_opts.auth_key,
        session_max_age: auth_opts.session_max_age,
        cookie_secure: auth_opts.cookie_secure,
        allowed_origin: auth_opts.allowed_origin,
    }))
}

use crate::{
    api::{
        self,
        handlers::{
            auth::{SessionLifecycle, SessionSigner},
            AppState,
        },
    },
    cli::telemetry,
    crypt::CredentialCipher,
    store::{memory::MemoryStore, postgres::PgStore, UserStore, WorkoutStore},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub session_key: SecretString,
    pub auth_key: SecretString,
    pub session_max_age: i64,
    pub cookie_secure: bool,
    pub allowed_origin: String,
}

/// Build the ciphers and the store, then run the API server until shutdown.
///
/// # Errors
/// Returns an error if a key is invalid, the database is unreachable, or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    let credentials = CredentialCipher::new(&args.auth_key).context("Invalid credential key")?;
    let signer = SessionSigner::new(&args.session_key)
        .context("Invalid session key")?
        .with_max_age_seconds(args.session_max_age)
        .with_secure(args.cookie_secure);

    let (users, workouts): (Arc<dyn UserStore>, Arc<dyn WorkoutStore>) =
        if let Some(dsn) = &args.dsn {
            let store = Arc::new(PgStore::connect(dsn).await?);
            debug!("Connected to database");
            (store.clone(), store)
        } else {
            warn!("No DSN configured, users and workouts are kept in memory");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        };

    let state = AppState {
        users,
        workouts,
        credentials: Arc::new(credentials),
        sessions: Arc::new(SessionLifecycle::new(signer)),
    };

    let result = api::new(args.port, state, &args.allowed_origin).await;

    telemetry::shutdown_tracer();

    result
}

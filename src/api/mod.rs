use self::{
    context::{seed_context, REQUEST_ID_HEADER},
    handlers::{
        auth::{self, guard, Chain, RequireRole, SessionGuard, ADMIN_ROLE},
        health, root, users, workouts, AppState,
    },
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Extension, Router,
};
use std::time::Duration;
use tokio::{
    net::TcpListener,
    signal::unix::{signal, SignalKind},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod context;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the application router.
///
/// Each route carries its own session chain; the request context is seeded for every
/// routed request ahead of those chains.
#[must_use]
pub fn router(state: AppState, allowed_origin: HeaderValue) -> Router {
    let sessions = state.sessions.clone();
    let establish = Chain::new().with(SessionGuard::establish(sessions.clone()));
    let verify = Chain::new().with(SessionGuard::verify(sessions.clone()));
    let terminate = Chain::new().with(SessionGuard::terminate(sessions.clone()));
    let admin = Chain::new()
        .with(SessionGuard::verify(sessions))
        .with(RequireRole(ADMIN_ROLE.to_string()));

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(AllowOrigin::exact(allowed_origin))
        .allow_credentials(true);

    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health).options(health::health))
        .route(
            "/auth/login",
            post(auth::login).route_layer(from_fn_with_state(establish.clone(), guard)),
        )
        .route(
            "/auth/logout",
            post(auth::logout).route_layer(from_fn_with_state(terminate, guard)),
        )
        .route(
            "/users",
            post(users::create_user)
                .route_layer(from_fn_with_state(establish, guard))
                .merge(get(users::list_users).route_layer(from_fn_with_state(admin, guard))),
        )
        .route(
            "/users/:user_id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user)
                .route_layer(from_fn_with_state(verify.clone(), guard)),
        )
        .route(
            "/users/:user_id/workouts",
            post(workouts::create_workout)
                .get(workouts::list_workouts)
                .route_layer(from_fn_with_state(verify.clone(), guard)),
        )
        .route(
            "/users/:user_id/workouts/:workout_id",
            get(workouts::get_workout)
                .patch(workouts::update_workout)
                .delete(workouts::delete_workout)
                .route_layer(from_fn_with_state(verify, guard)),
        )
        .route_layer(from_fn(seed_context))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::overriding(
                    x_request_id.clone(),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors)
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: AppState, allowed_origin: &str) -> Result<()> {
    let app = router(state, origin_header(allowed_origin)?);

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to set up SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to set up SIGINT handler")?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Reduce a configured URL to the `scheme://host[:port]` origin CORS compares against.
///
/// # Errors
/// Returns an error if the URL does not parse or has no host.
pub fn origin_header(url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid allowed origin: {url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Allowed origin must include a valid host: {url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build allowed origin header")
}

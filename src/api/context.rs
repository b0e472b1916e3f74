//! Per-request context threaded through the middleware chain.
//!
//! The context is seeded once per request, after routing so path parameters are
//! known, and stored in the request extensions. Session stages fill in the caller
//! identity or mark the request stopped.

use axum::{
    extract::{Path, Request},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use tracing::debug;
use ulid::Ulid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const USER_ID_PARAM: &str = "user_id";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
    client_user_id: Option<String>,
    caller_user_id: Option<String>,
    roles: Vec<String>,
    stopped: bool,
}

impl RequestContext {
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_client_user_id(mut self, client_user_id: Option<String>) -> Self {
        self.client_user_id = client_user_id.filter(|id| !id.is_empty());
        self
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// User id named by the request path, if the route is owner-scoped.
    #[must_use]
    pub fn client_user_id(&self) -> Option<&str> {
        self.client_user_id.as_deref()
    }

    /// User id resolved from a verified session.
    #[must_use]
    pub fn caller_user_id(&self) -> Option<&str> {
        self.caller_user_id.as_deref()
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn set_caller(&mut self, user_id: String, roles: Vec<String>) {
        self.caller_user_id = Some(user_id);
        self.roles = roles;
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Seed a [`RequestContext`] for every routed request.
///
/// The request id comes from the `x-request-id` header set by the outer service
/// stack; a fresh ULID is used when it is missing.
pub async fn seed_context(
    params: Option<Path<HashMap<String, String>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| Ulid::new().to_string(), ToString::to_string);

    let client_user_id = params.and_then(|Path(mut params)| params.remove(USER_ID_PARAM));

    debug!(
        request_id,
        client_user_id = client_user_id.as_deref().unwrap_or_default(),
        method = %request.method(),
        uri = %request.uri(),
        "inbound request"
    );

    let context = RequestContext::new(request_id).with_client_user_id(client_user_id);
    request.extensions_mut().insert(context);

    let response = next.run(request).await;

    debug!(status = response.status().as_u16(), "outbound response");

    response
}

//! Middleware chain of session stages.
//!
//! Each stage returns [`Flow::Continue`] or [`Flow::Halt`]. The runner applies the
//! stages in registration order and stops at the first halt: the context is marked
//! stopped, cookies queued by earlier stages are discarded and the handler never runs.

use super::{
    error::AuthError,
    lifecycle::SessionLifecycle,
    session::ResponseCookies,
};
use crate::api::context::RequestContext;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt(AuthError),
}

impl From<Result<(), AuthError>> for Flow {
    fn from(result: Result<(), AuthError>) -> Self {
        match result {
            Ok(()) => Self::Continue,
            Err(err) => Self::Halt(err),
        }
    }
}

pub trait Stage: Send + Sync {
    fn apply(
        &self,
        headers: &HeaderMap,
        context: &mut RequestContext,
        cookies: &mut ResponseCookies,
    ) -> Flow;
}

#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<Arc<dyn Stage>>,
}

impl Chain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn run(
        &self,
        headers: &HeaderMap,
        context: &mut RequestContext,
        cookies: &mut ResponseCookies,
    ) -> Flow {
        for stage in &self.stages {
            if let Flow::Halt(err) = stage.apply(headers, context, cookies) {
                err.log(context.request_id());
                context.stop();
                cookies.clear();
                return Flow::Halt(err);
            }
        }
        Flow::Continue
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    Establish,
    Verify,
    Terminate,
}

/// Stage running one session lifecycle operation.
#[derive(Clone, Debug)]
pub struct SessionGuard {
    lifecycle: Arc<SessionLifecycle>,
    operation: Operation,
}

impl SessionGuard {
    #[must_use]
    pub const fn establish(lifecycle: Arc<SessionLifecycle>) -> Self {
        Self {
            lifecycle,
            operation: Operation::Establish,
        }
    }

    #[must_use]
    pub const fn verify(lifecycle: Arc<SessionLifecycle>) -> Self {
        Self {
            lifecycle,
            operation: Operation::Verify,
        }
    }

    #[must_use]
    pub const fn terminate(lifecycle: Arc<SessionLifecycle>) -> Self {
        Self {
            lifecycle,
            operation: Operation::Terminate,
        }
    }
}

impl Stage for SessionGuard {
    fn apply(
        &self,
        headers: &HeaderMap,
        context: &mut RequestContext,
        cookies: &mut ResponseCookies,
    ) -> Flow {
        match self.operation {
            Operation::Establish => self.lifecycle.establish(headers, cookies),
            Operation::Verify => self.lifecycle.verify(headers, context),
            Operation::Terminate => self.lifecycle.terminate(headers, cookies),
        }
        .into()
    }
}

/// Stage requiring a role on an already verified caller.
#[derive(Clone, Debug)]
pub struct RequireRole(pub String);

impl Stage for RequireRole {
    fn apply(
        &self,
        _headers: &HeaderMap,
        context: &mut RequestContext,
        _cookies: &mut ResponseCookies,
    ) -> Flow {
        if context.roles().iter().any(|role| role == &self.0) {
            Flow::Continue
        } else {
            Flow::Halt(AuthError::MissingRole(self.0.clone()))
        }
    }
}

/// axum middleware running `chain` ahead of the handler.
pub async fn guard(State(chain): State<Chain>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let Some(mut context) = parts.extensions.remove::<RequestContext>() else {
        let err = AuthError::MissingRequestContext;
        err.log("none");
        return err.into_response();
    };

    let mut cookies = ResponseCookies::default();
    if let Flow::Halt(err) = chain.run(&parts.headers, &mut context, &mut cookies) {
        return err.into_response();
    }

    parts.extensions.insert(context);
    let mut response = next.run(Request::from_parts(parts, body)).await;
    cookies.apply(&mut response);

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::Mutex;

    /// Records its name and returns a fixed flow.
    struct Probe {
        name: &'static str,
        halt: bool,
        trace: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Stage for Probe {
        fn apply(
            &self,
            _headers: &HeaderMap,
            _context: &mut RequestContext,
            cookies: &mut ResponseCookies,
        ) -> Flow {
            self.trace.lock().unwrap().push(self.name);
            cookies.push(HeaderValue::from_static("probe=1"));
            if self.halt {
                Flow::Halt(AuthError::NotAuthenticated)
            } else {
                Flow::Continue
            }
        }
    }

    fn probe(name: &'static str, halt: bool, trace: &Arc<Mutex<Vec<&'static str>>>) -> Probe {
        Probe {
            name,
            halt,
            trace: trace.clone(),
        }
    }

    #[test]
    fn test_stages_run_in_order() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::new()
            .with(probe("first", false, &trace))
            .with(probe("second", false, &trace));

        let mut context = RequestContext::new("req-1");
        let mut cookies = ResponseCookies::default();
        let flow = chain.run(&HeaderMap::new(), &mut context, &mut cookies);

        assert_eq!(flow, Flow::Continue);
        assert_eq!(*trace.lock().unwrap(), vec!["first", "second"]);
        assert!(!context.is_stopped());
        assert_eq!(cookies.values().len(), 2);
    }

    #[test]
    fn test_halt_stops_chain_and_discards_cookies() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::new()
            .with(probe("first", false, &trace))
            .with(probe("second", true, &trace))
            .with(probe("third", false, &trace));

        let mut context = RequestContext::new("req-1");
        let mut cookies = ResponseCookies::default();
        let flow = chain.run(&HeaderMap::new(), &mut context, &mut cookies);

        assert_eq!(flow, Flow::Halt(AuthError::NotAuthenticated));
        assert_eq!(*trace.lock().unwrap(), vec!["first", "second"]);
        assert!(context.is_stopped());
        assert!(cookies.is_empty());
    }

    #[test]
    fn test_require_role() {
        let stage = RequireRole("ADMIN".to_string());
        let mut cookies = ResponseCookies::default();

        let mut context = RequestContext::new("req-1");
        context.set_caller("u1".into(), vec!["CIVILIAN".into()]);
        assert_eq!(
            stage.apply(&HeaderMap::new(), &mut context, &mut cookies),
            Flow::Halt(AuthError::MissingRole("ADMIN".to_string()))
        );

        context.set_caller("u1".into(), vec!["CIVILIAN".into(), "ADMIN".into()]);
        assert_eq!(
            stage.apply(&HeaderMap::new(), &mut context, &mut cookies),
            Flow::Continue
        );
    }

    #[test]
    fn test_empty_chain_continues() {
        let mut context = RequestContext::new("req-1");
        let mut cookies = ResponseCookies::default();
        assert_eq!(
            Chain::new().run(&HeaderMap::new(), &mut context, &mut cookies),
            Flow::Continue
        );
    }
}

//! Session lifecycle: establish, hydrate, verify and terminate.
//!
//! ```text
//! Anonymous --establish--> Authenticated --hydrate--> Authenticated (with identity)
//!     ^                                                        |
//!     +---------------------------terminate--------------------+
//! ```

use super::{
    error::AuthError,
    policy::{authorize, Identity},
    session::{ResponseCookies, SessionClaims, SessionError, SessionSigner},
};
use crate::api::context::RequestContext;
use axum::http::HeaderMap;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct SessionLifecycle {
    signer: SessionSigner,
}

impl SessionLifecycle {
    #[must_use]
    pub const fn new(signer: SessionSigner) -> Self {
        Self { signer }
    }

    #[must_use]
    pub const fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    /// Mark the session authenticated ahead of login or registration.
    ///
    /// A present cookie must still open. Whatever identity it carried is dropped, so the
    /// new session only gains a user id and roles through [`Self::hydrate`].
    ///
    /// # Errors
    /// Returns [`AuthError::Session`] when the cookie is present but cannot be opened.
    pub fn establish(
        &self,
        headers: &HeaderMap,
        cookies: &mut ResponseCookies,
    ) -> Result<(), AuthError> {
        match self.signer.decode(headers) {
            Ok(_) | Err(SessionError::MissingCookie | SessionError::Expired) => {}
            Err(err) => return Err(err.into()),
        }
        let claims = SessionClaims {
            authenticated: Some(true),
            ..SessionClaims::default()
        };
        self.signer.encode(&claims, cookies);
        Ok(())
    }

    /// Write the resolved identity into the session.
    ///
    /// # Errors
    /// Returns [`AuthError::MissingRequestContext`] when the request never passed through
    /// the context middleware.
    pub fn hydrate(
        &self,
        context: Option<&RequestContext>,
        user_id: &str,
        roles: Vec<String>,
    ) -> Result<ResponseCookies, AuthError> {
        let Some(context) = context else {
            let err = AuthError::MissingRequestContext;
            err.log("none");
            return Err(err);
        };

        debug!(request_id = context.request_id(), user_id, "Hydrating session");

        let mut cookies = ResponseCookies::default();
        self.signer
            .encode(&SessionClaims::hydrated(user_id, roles), &mut cookies);
        Ok(cookies)
    }

    /// Validate the session claims and apply the ownership policy.
    ///
    /// On success the caller identity is recorded on the context.
    ///
    /// # Errors
    /// Returns 401-class errors for codec failures and 403-class errors for claim or
    /// policy failures.
    pub fn verify(
        &self,
        headers: &HeaderMap,
        context: &mut RequestContext,
    ) -> Result<(), AuthError> {
        let claims = self.signer.decode(headers)?;
        let identity = identity_from_claims(claims)?;

        authorize(&identity, context.client_user_id())?;

        context.set_caller(identity.user_id, identity.roles);
        Ok(())
    }

    /// Flip the session to unauthenticated.
    ///
    /// # Errors
    /// Returns [`AuthError::Session`] when the cookie is missing or cannot be opened.
    pub fn terminate(
        &self,
        headers: &HeaderMap,
        cookies: &mut ResponseCookies,
    ) -> Result<(), AuthError> {
        let mut claims = self.signer.decode(headers)?;
        claims.authenticated = Some(false);
        self.signer.encode(&claims, cookies);
        Ok(())
    }
}

fn identity_from_claims(claims: SessionClaims) -> Result<Identity, AuthError> {
    if !claims.is_authenticated() {
        return Err(AuthError::NotAuthenticated);
    }

    let roles = claims
        .roles
        .filter(|roles| !roles.is_empty())
        .ok_or(AuthError::MissingRoles)?;

    let user_id = claims
        .user_id
        .filter(|user_id| !user_id.is_empty())
        .ok_or(AuthError::MissingUserId)?;

    Ok(Identity { user_id, roles })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::session::SESSION_COOKIE_NAME;
    use axum::http::{header::COOKIE, HeaderValue};
    use secrecy::SecretString;

    fn lifecycle() -> SessionLifecycle {
        SessionLifecycle::new(SessionSigner::new(&SecretString::from("lifecycle-secret")).unwrap())
    }

    /// Turn queued `Set-Cookie` values into the `Cookie` header a browser would send back.
    fn jar(cookies: &ResponseCookies) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(header) = cookies.values().last() {
            let pair = header.to_str().unwrap().split(';').next().unwrap();
            headers.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        }
        headers
    }

    fn headers_for(lifecycle: &SessionLifecycle, claims: &SessionClaims) -> HeaderMap {
        let mut cookies = ResponseCookies::default();
        lifecycle.signer().encode(claims, &mut cookies);
        jar(&cookies)
    }

    fn context_for(client_user_id: Option<&str>) -> RequestContext {
        RequestContext::new("req-test").with_client_user_id(client_user_id.map(String::from))
    }

    fn civilian(user_id: &str) -> SessionClaims {
        SessionClaims::hydrated(user_id, vec!["CIVILIAN".to_string()])
    }

    #[test]
    fn test_establish_without_cookie() {
        let lifecycle = lifecycle();
        let mut cookies = ResponseCookies::default();
        lifecycle.establish(&HeaderMap::new(), &mut cookies).unwrap();

        let claims = lifecycle.signer().decode(&jar(&cookies)).unwrap();
        assert_eq!(
            claims,
            SessionClaims {
                authenticated: Some(true),
                user_id: None,
                roles: None,
            }
        );
    }

    #[test]
    fn test_establish_drops_stale_identity() {
        let lifecycle = lifecycle();
        let mut logged_out = civilian("u1");
        logged_out.authenticated = Some(false);

        let mut cookies = ResponseCookies::default();
        lifecycle
            .establish(&headers_for(&lifecycle, &logged_out), &mut cookies)
            .unwrap();

        let claims = lifecycle.signer().decode(&jar(&cookies)).unwrap();
        assert_eq!(claims.user_id, None);
        assert_eq!(claims.roles, None);

        let mut context = context_for(Some("u1"));
        assert_eq!(
            lifecycle.verify(&jar(&cookies), &mut context),
            Err(AuthError::MissingRoles)
        );
    }

    #[test]
    fn test_establish_rejects_tampered_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}=bogus")).unwrap(),
        );
        let mut cookies = ResponseCookies::default();
        let result = lifecycle().establish(&headers, &mut cookies);
        assert_eq!(result, Err(AuthError::Session(SessionError::TamperedCookie)));
        assert!(cookies.is_empty());
    }

    #[test]
    fn test_establish_alone_does_not_pass_verify() {
        let lifecycle = lifecycle();
        let mut cookies = ResponseCookies::default();
        lifecycle.establish(&HeaderMap::new(), &mut cookies).unwrap();

        let mut context = context_for(None);
        assert_eq!(
            lifecycle.verify(&jar(&cookies), &mut context),
            Err(AuthError::MissingRoles)
        );
    }

    #[test]
    fn test_hydrate_writes_identity() {
        let lifecycle = lifecycle();
        let context = context_for(None);
        let cookies = lifecycle
            .hydrate(Some(&context), "u1", vec!["CIVILIAN".to_string()])
            .unwrap();

        let claims = lifecycle.signer().decode(&jar(&cookies)).unwrap();
        assert_eq!(claims, civilian("u1"));
    }

    #[test]
    fn test_hydrate_requires_context() {
        let result = lifecycle().hydrate(None, "u1", vec!["CIVILIAN".to_string()]);
        assert!(matches!(result, Err(AuthError::MissingRequestContext)));
    }

    #[test]
    fn test_verify_missing_cookie() {
        let mut context = context_for(None);
        assert_eq!(
            lifecycle().verify(&HeaderMap::new(), &mut context),
            Err(AuthError::Session(SessionError::MissingCookie))
        );
        assert_eq!(context.caller_user_id(), None);
    }

    #[test]
    fn test_verify_records_caller() {
        let lifecycle = lifecycle();
        let headers = headers_for(&lifecycle, &civilian("u1"));
        let mut context = context_for(Some("u1"));

        lifecycle.verify(&headers, &mut context).unwrap();
        assert_eq!(context.caller_user_id(), Some("u1"));
        assert_eq!(context.roles(), ["CIVILIAN".to_string()]);
    }

    #[test]
    fn test_verify_unauthenticated_always_forbidden() {
        let lifecycle = lifecycle();
        for authenticated in [None, Some(false)] {
            let claims = SessionClaims {
                authenticated,
                user_id: Some("u1".to_string()),
                roles: Some(vec!["ADMIN".to_string()]),
            };
            let headers = headers_for(&lifecycle, &claims);
            let mut context = context_for(Some("u1"));
            let err = lifecycle.verify(&headers, &mut context).unwrap_err();
            assert_eq!(err, AuthError::NotAuthenticated);
            assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn test_verify_requires_roles_and_user_id() {
        let lifecycle = lifecycle();

        let no_roles = SessionClaims {
            roles: Some(Vec::new()),
            ..civilian("u1")
        };
        assert_eq!(
            lifecycle.verify(&headers_for(&lifecycle, &no_roles), &mut context_for(None)),
            Err(AuthError::MissingRoles)
        );

        let no_user = SessionClaims {
            user_id: Some(String::new()),
            ..civilian("u1")
        };
        assert_eq!(
            lifecycle.verify(&headers_for(&lifecycle, &no_user), &mut context_for(None)),
            Err(AuthError::MissingUserId)
        );
    }

    #[test]
    fn test_verify_applies_ownership() {
        let lifecycle = lifecycle();
        let headers = headers_for(&lifecycle, &civilian("u1"));
        let mut context = context_for(Some("u2"));
        assert!(matches!(
            lifecycle.verify(&headers, &mut context),
            Err(AuthError::OwnerMismatch { .. })
        ));

        let admin = SessionClaims::hydrated("u1", vec!["CIVILIAN".into(), "ADMIN".into()]);
        let headers = headers_for(&lifecycle, &admin);
        let mut context = context_for(Some("u2"));
        assert!(lifecycle.verify(&headers, &mut context).is_ok());
    }

    #[test]
    fn test_terminate_then_verify_forbidden() {
        let lifecycle = lifecycle();
        let headers = headers_for(&lifecycle, &civilian("u1"));

        let mut cookies = ResponseCookies::default();
        lifecycle.terminate(&headers, &mut cookies).unwrap();

        let mut context = context_for(Some("u1"));
        assert_eq!(
            lifecycle.verify(&jar(&cookies), &mut context),
            Err(AuthError::NotAuthenticated)
        );
    }

    #[test]
    fn test_terminate_without_cookie() {
        let mut cookies = ResponseCookies::default();
        assert_eq!(
            lifecycle().terminate(&HeaderMap::new(), &mut cookies),
            Err(AuthError::Session(SessionError::MissingCookie))
        );
        assert!(cookies.is_empty());
    }

    #[test]
    fn test_operations_are_idempotent() {
        let lifecycle = lifecycle();
        let headers = headers_for(&lifecycle, &civilian("u1"));

        let mut first = ResponseCookies::default();
        let mut second = ResponseCookies::default();
        lifecycle.terminate(&headers, &mut first).unwrap();
        lifecycle.terminate(&headers, &mut second).unwrap();

        assert_eq!(
            lifecycle.signer().decode(&jar(&first)).unwrap(),
            lifecycle.signer().decode(&jar(&second)).unwrap()
        );
    }
}

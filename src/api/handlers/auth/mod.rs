//! Session authentication and authorization.
//!
//! Flow Overview:
//! 1) `establish` marks the session authenticated ahead of login or registration.
//! 2) The login or register handler hydrates the session with the user id and roles.
//! 3) Protected routes run `verify`, which checks the claims and the ownership policy.
//! 4) `terminate` flips the session back to unauthenticated on logout.

pub mod chain;
pub mod error;
pub mod lifecycle;
pub mod login;
pub mod policy;
pub mod session;

pub use self::{
    chain::{guard, Chain, Flow, RequireRole, SessionGuard, Stage},
    error::AuthError,
    lifecycle::SessionLifecycle,
    login::{login, logout},
    policy::{ADMIN_ROLE, DEFAULT_ROLE},
    session::{ResponseCookies, SessionClaims, SessionError, SessionSigner, SESSION_COOKIE_NAME},
};

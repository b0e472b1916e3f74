//! Encrypted session cookie codec.
//!
//! Cookie value layout, URL-safe base64 without padding:
//! `issued_at (i64, big endian) || nonce (12 bytes) || AES-256-GCM(claims JSON)`.
//! The AEAD associated data binds the cookie name and the issue time, so a value
//! cannot be moved to another cookie or re-dated without failing authentication.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use axum::{
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    response::{IntoResponse, IntoResponseParts, Response, ResponseParts},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;

pub const SESSION_COOKIE_NAME: &str = "sandbox-cookie";
pub const DEFAULT_SESSION_MAX_AGE_SECONDS: i64 = 60 * 60 * 24 * 30;

const ISSUED_AT_LENGTH: usize = 8;
const NONCE_LENGTH: usize = 12;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("session secret must not be empty")]
    EmptySecret,
    #[error("session cookie missing")]
    MissingCookie,
    #[error("session cookie failed verification")]
    TamperedCookie,
    #[error("session cookie expired")]
    Expired,
    #[error("failed to seal session cookie")]
    Seal,
}

/// Claims carried by the session cookie.
///
/// Absent keys decode to `None`. A key holding a value of the wrong type fails the
/// whole decode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl SessionClaims {
    #[must_use]
    pub fn hydrated(user_id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            authenticated: Some(true),
            user_id: Some(user_id.into()),
            roles: Some(roles),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated == Some(true)
    }
}

/// `Set-Cookie` values queued for the outbound response.
#[derive(Clone, Debug, Default)]
pub struct ResponseCookies(Vec<HeaderValue>);

impl ResponseCookies {
    pub fn push(&mut self, value: HeaderValue) {
        self.0.push(value);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[HeaderValue] {
        &self.0
    }

    /// Append the queued cookies to a successful response that does not already set the
    /// session cookie. Error responses never carry a session write.
    pub fn apply(self, response: &mut Response) {
        if !response.status().is_success() || sets_session_cookie(response.headers()) {
            return;
        }
        for value in self.0 {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
}

impl IntoResponseParts for ResponseCookies {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for value in self.0 {
            res.headers_mut().append(SET_COOKIE, value);
        }
        Ok(res)
    }
}

impl IntoResponse for ResponseCookies {
    fn into_response(self) -> Response {
        (self, ()).into_response()
    }
}

fn sets_session_cookie(headers: &HeaderMap) -> bool {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix))
}

/// Seals and opens session cookies with a key derived from the session secret.
#[derive(Clone)]
pub struct SessionSigner {
    cipher: Aes256Gcm,
    max_age_seconds: i64,
    secure: bool,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("key", &"***")
            .field("max_age_seconds", &self.max_age_seconds)
            .field("secure", &self.secure)
            .finish()
    }
}

impl SessionSigner {
    /// # Errors
    /// Returns [`SessionError::EmptySecret`] if the secret is empty.
    pub fn new(secret: &SecretString) -> Result<Self, SessionError> {
        let secret = secret.expose_secret();
        if secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }

        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| SessionError::EmptySecret)?;

        Ok(Self {
            cipher,
            max_age_seconds: DEFAULT_SESSION_MAX_AGE_SECONDS,
            secure: false,
        })
    }

    #[must_use]
    pub fn with_max_age_seconds(mut self, max_age_seconds: i64) -> Self {
        self.max_age_seconds = max_age_seconds;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub const fn max_age_seconds(&self) -> i64 {
        self.max_age_seconds
    }

    /// Read the session claims from the request cookies.
    ///
    /// # Errors
    /// Returns [`SessionError::MissingCookie`] when no session cookie is present, and
    /// [`SessionError::TamperedCookie`] or [`SessionError::Expired`] when it cannot be opened.
    pub fn decode(&self, headers: &HeaderMap) -> Result<SessionClaims, SessionError> {
        let value = extract_cookie(headers, SESSION_COOKIE_NAME).ok_or(SessionError::MissingCookie)?;
        self.open(&value, now())
    }

    /// Queue a cookie carrying `claims`.
    ///
    /// Failures are logged and leave the response without a session cookie.
    pub fn encode(&self, claims: &SessionClaims, cookies: &mut ResponseCookies) {
        match self
            .seal(claims, now())
            .and_then(|value| self.cookie_header(&value))
        {
            Ok(header) => cookies.push(header),
            Err(err) => warn!("Failed to write session cookie: {err}"),
        }
    }

    /// # Errors
    /// Returns [`SessionError::Seal`] if the random source or the AEAD fails.
    pub fn seal(&self, claims: &SessionClaims, issued_at: i64) -> Result<String, SessionError> {
        let plaintext = serde_json::to_vec(claims).map_err(|_| SessionError::Seal)?;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|_| SessionError::Seal)?;

        let issued_at = issued_at.to_be_bytes();
        let aad = associated_data(&issued_at);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| SessionError::Seal)?;

        let mut raw = Vec::with_capacity(ISSUED_AT_LENGTH + NONCE_LENGTH + ciphertext.len());
        raw.extend_from_slice(&issued_at);
        raw.extend_from_slice(&nonce_bytes);
        raw.extend_from_slice(&ciphertext);

        Ok(Base64UrlUnpadded::encode_string(&raw))
    }

    /// # Errors
    /// Returns [`SessionError::TamperedCookie`] for anything that does not authenticate or
    /// deserialize, and [`SessionError::Expired`] when the cookie is older than the max age.
    pub fn open(&self, value: &str, now: i64) -> Result<SessionClaims, SessionError> {
        let raw = Base64UrlUnpadded::decode_vec(value).map_err(|_| SessionError::TamperedCookie)?;
        if raw.len() < ISSUED_AT_LENGTH + NONCE_LENGTH {
            return Err(SessionError::TamperedCookie);
        }

        let (issued_at, rest) = raw.split_at(ISSUED_AT_LENGTH);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LENGTH);

        let aad = associated_data(issued_at);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| SessionError::TamperedCookie)?;

        let issued_at = <[u8; ISSUED_AT_LENGTH]>::try_from(issued_at)
            .map(i64::from_be_bytes)
            .map_err(|_| SessionError::TamperedCookie)?;
        if now.saturating_sub(issued_at) > self.max_age_seconds {
            return Err(SessionError::Expired);
        }

        serde_json::from_slice(&plaintext).map_err(|_| SessionError::TamperedCookie)
    }

    fn cookie_header(&self, value: &str) -> Result<HeaderValue, SessionError> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.max_age_seconds
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|_| SessionError::Seal)
    }
}

fn associated_data(issued_at: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(SESSION_COOKIE_NAME.len() + 1 + issued_at.len());
    aad.extend_from_slice(SESSION_COOKIE_NAME.as_bytes());
    aad.push(b'|');
    aad.extend_from_slice(issued_at);
    aad
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Return the first cookie named `name` from the request headers.
pub(crate) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) if key == name && !value.is_empty() => {
                    Some(value.to_string())
                }
                _ => None,
            }
        })
}

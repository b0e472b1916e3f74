//! # Sandbox (Workout Planning API)
//!
//! `sandbox` serves users and their workouts over HTTP, protected by an encrypted
//! session cookie.
//!
//! ## Sessions
//!
//! The cookie carries three claims: `authenticated`, `user_id` and `roles`. It is
//! sealed with AES-256-GCM and bound to its name and issue time, so a client can
//! neither read nor alter it. Login and registration establish and hydrate the session,
//! logout terminates it, and every other protected route verifies it.
//!
//! ## Authorization
//!
//! Routes under `/users/{user_id}` are owner-scoped: the session user must match the
//! path user unless the session carries the `ADMIN` role. Listing all users requires
//! `ADMIN`. Codec failures answer `401`; claim and policy failures answer `403`.
//!
//! ## Credentials
//!
//! Passwords are stored encrypted with a dedicated AES-256-GCM key and compared
//! byte for byte after decryption. They never appear in responses or logs.

pub mod api;
pub mod cli;
pub mod crypt;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}

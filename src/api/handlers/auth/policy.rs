//! Ownership and role checks applied to verified sessions.

use super::error::AuthError;

pub const ADMIN_ROLE: &str = "ADMIN";
pub const DEFAULT_ROLE: &str = "CIVILIAN";

/// Identity resolved from a verified session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub roles: Vec<String>,
}

impl Identity {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// Deny unless the caller owns the resource or holds the admin role.
///
/// Routes without a path-scoped owner skip the check.
///
/// # Errors
/// Returns [`AuthError::OwnerMismatch`] when a non-admin caller targets another user.
pub fn authorize(identity: &Identity, client_user_id: Option<&str>) -> Result<(), AuthError> {
    match client_user_id {
        Some(requested) if requested != identity.user_id && !identity.is_admin() => {
            Err(AuthError::OwnerMismatch {
                caller: identity.user_id.clone(),
                requested: requested.to_string(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn identity(user_id: &str, roles: &[&str]) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_self_access_allowed() {
        assert!(authorize(&identity("user_1", &["CIVILIAN"]), Some("user_1")).is_ok());
    }

    #[test]
    fn test_collection_route_skips_ownership() {
        assert!(authorize(&identity("user_1", &["CIVILIAN"]), None).is_ok());
    }

    #[test]
    fn test_cross_user_denied() {
        assert_eq!(
            authorize(&identity("user_1", &["CIVILIAN"]), Some("user_2")),
            Err(AuthError::OwnerMismatch {
                caller: "user_1".to_string(),
                requested: "user_2".to_string(),
            })
        );
    }

    #[test]
    fn test_admin_overrides_ownership() {
        assert!(authorize(&identity("user_1", &["CIVILIAN", "ADMIN"]), Some("user_2")).is_ok());
    }

    #[test]
    fn test_role_names_are_case_sensitive() {
        assert!(authorize(&identity("user_1", &["admin"]), Some("user_2")).is_err());
    }

    proptest! {
        #[test]
        fn prop_non_admin_mismatch_denied(
            caller in "user_[a-z0-9]{1,10}",
            requested in "user_[a-z0-9]{1,10}",
            roles in proptest::collection::vec("[A-Z]{1,8}", 1..4),
        ) {
            prop_assume!(caller != requested);
            prop_assume!(!roles.iter().any(|r| r == ADMIN_ROLE));
            let identity = Identity { user_id: caller, roles };
            prop_assert!(authorize(&identity, Some(&requested)).is_err());
        }

        #[test]
        fn prop_admin_never_denied(
            caller in "user_[a-z0-9]{1,10}",
            requested in proptest::option::of("user_[a-z0-9]{1,10}"),
            mut roles in proptest::collection::vec("[A-Z]{1,8}", 0..4),
        ) {
            roles.push(ADMIN_ROLE.to_string());
            let identity = Identity { user_id: caller, roles };
            prop_assert!(authorize(&identity, requested.as_deref()).is_ok());
        }
    }
}

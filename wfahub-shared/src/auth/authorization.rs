/// Role and ownership checks
///
/// Two roles exist: `user` and `admin`. Admin routes call [`require_admin`]
/// before doing anything else, and destructive admin operations on accounts
/// call [`ensure_not_self`] so an administrator cannot demote or delete the
/// account they are signed in with.
///
/// # Example
///
/// ```
/// use wfahub_shared::auth::authorization::{ensure_not_self, require_admin};
/// use wfahub_shared::auth::middleware::AuthContext;
/// use wfahub_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let admin = AuthContext {
///     user_id: Uuid::new_v4(),
///     email: "ops@example.com".to_string(),
///     role: UserRole::Admin,
/// };
///
/// assert!(require_admin(&admin).is_ok());
/// assert!(ensure_not_self(&admin, admin.user_id, "delete").is_err());
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::UserRole;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthzError {
    /// Caller doesn't have the required role
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole {
        required: &'static str,
        actual: &'static str,
    },

    /// Admin tried to modify their own account
    #[error("Administrators cannot {0} their own account")]
    SelfModification(&'static str),

    /// Caller doesn't own the resource
    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Fails unless the caller is an admin
pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.role != UserRole::Admin {
        return Err(AuthzError::InsufficientRole {
            required: UserRole::Admin.as_str(),
            actual: auth.role.as_str(),
        });
    }
    Ok(())
}

/// Fails when `target_user_id` is the caller
///
/// `action` is a verb used in the error message, e.g. "delete".
pub fn ensure_not_self(
    auth: &AuthContext,
    target_user_id: Uuid,
    action: &'static str,
) -> Result<(), AuthzError> {
    if auth.user_id == target_user_id {
        return Err(AuthzError::SelfModification(action));
    }
    Ok(())
}

/// Fails unless the caller owns the resource
///
/// Rows with no owner (system SMTP configs) are never owned by a regular user.
pub fn require_owner(auth: &AuthContext, owner_id: Option<Uuid>) -> Result<(), AuthzError> {
    match owner_id {
        Some(owner) if owner == auth.user_id => Ok(()),
        _ => Err(AuthzError::NotAuthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: UserRole) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&context(UserRole::Admin)).is_ok());

        let err = require_admin(&context(UserRole::User)).unwrap_err();
        assert_eq!(
            err,
            AuthzError::InsufficientRole {
                required: "admin",
                actual: "user"
            }
        );
    }

    #[test]
    fn test_admin_cannot_target_own_account() {
        let admin = context(UserRole::Admin);

        let err = ensure_not_self(&admin, admin.user_id, "delete").unwrap_err();
        assert_eq!(err.to_string(), "Administrators cannot delete their own account");

        assert!(ensure_not_self(&admin, admin.user_id, "change the role of").is_err());
        assert!(ensure_not_self(&admin, Uuid::new_v4(), "delete").is_ok());
    }

    #[test]
    fn test_require_owner() {
        let user = context(UserRole::User);

        assert!(require_owner(&user, Some(user.user_id)).is_ok());
        assert_eq!(
            require_owner(&user, Some(Uuid::new_v4())),
            Err(AuthzError::NotAuthorized)
        );
        assert_eq!(require_owner(&user, None), Err(AuthzError::NotAuthorized));
    }
}

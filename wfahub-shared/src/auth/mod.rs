/// Authentication and authorization utilities
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: signed session, password-reset and email-verification tokens
/// - [`middleware`]: session extraction and the per-request `AuthContext`
/// - [`authorization`]: role checks and admin self-protection
///
/// # Example
///
/// ```
/// use wfahub_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Correct-Horse-1")?;
/// assert!(verify_password("Correct-Horse-1", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;

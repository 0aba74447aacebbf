/// Password hashing using Argon2id
///
/// Hashes are stored in PHC string format, so the parameters travel with the
/// hash and verification works even if the defaults below change later.
///
/// - Memory: 64 MB
/// - Iterations: 3
/// - Parallelism: 4 lanes
///
/// # Example
///
/// ```
/// use wfahub_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Sup3r-secret")?;
/// assert!(verify_password("Sup3r-secret", &hash)?);
/// assert!(!verify_password("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use sha2::{Digest, Sha256};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes a password with Argon2id and a random 16-byte salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` for a wrong password and `Err` only when the stored
/// hash itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Checks the password policy
///
/// At least 8 characters with an uppercase letter, a lowercase letter and a
/// digit.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_numeric()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

/// Short, stable digest of a password hash
///
/// Embedded in password-reset tokens so a token stops working as soon as the
/// password it was issued against has changed.
pub fn hash_fingerprint(password_hash: &str) -> String {
    let digest = Sha256::digest(password_hash.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_uses_argon2id() {
        let hash = hash_password("Quotation-2024").expect("hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("Right-one-1").unwrap();

        assert!(verify_password("Right-one-1", &hash).unwrap());
        assert!(!verify_password("Wrong-one-1", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(verify_password("password", "not-a-hash").is_err());
        assert!(verify_password("password", "$argon2id$broken").is_err());
    }

    #[test]
    fn test_password_strength_rules() {
        assert!(validate_password_strength("Invoice2024").is_ok());
        assert!(validate_password_strength("Str0ngPass").is_ok());

        let err = validate_password_strength("Sh0rt").unwrap_err();
        assert!(err.contains("at least 8 characters"));

        let err = validate_password_strength("alllower1").unwrap_err();
        assert!(err.contains("uppercase"));

        let err = validate_password_strength("ALLUPPER1").unwrap_err();
        assert!(err.contains("lowercase"));

        let err = validate_password_strength("NoDigitsHere").unwrap_err();
        assert!(err.contains("digit"));
    }

    #[test]
    fn test_hash_fingerprint_tracks_hash_changes() {
        let a = hash_fingerprint("$argon2id$v=19$m=65536,t=3,p=4$aaaa$bbbb");
        let b = hash_fingerprint("$argon2id$v=19$m=65536,t=3,p=4$cccc$dddd");

        assert_eq!(a.len(), 16);
        assert_eq!(a, hash_fingerprint("$argon2id$v=19$m=65536,t=3,p=4$aaaa$bbbb"));
        assert_ne!(a, b);
    }
}

/// Signed tokens for sessions and one-off account actions
///
/// Every token is an HS256 JWT signed with the server's session secret. The
/// `token_type` claim keeps the three uses apart so a password-reset link can
/// never be replayed as a session cookie and vice versa.
///
/// # Token Types
///
/// - **Session**: carried in the session cookie, lifetime from configuration
/// - **PasswordReset**: 30 minutes, bound to a fingerprint of the current password hash
/// - **EmailVerification**: 48 hours
///
/// # Example
///
/// ```
/// use wfahub_shared::auth::jwt::{create_token, validate_session_token, Claims, TokenType};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let secret = "a-session-secret-of-at-least-32-bytes!!";
///
/// let claims = Claims::session(user_id, Duration::hours(12));
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_session_token(&token, secret)?;
/// assert_eq!(validated.sub, user_id);
/// assert_eq!(validated.token_type, TokenType::Session);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ISSUER: &str = "wfahub";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, issuer or format check failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token was issued for another purpose
    #[error("Expected {expected} token, got {actual}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    /// Password-reset token no longer matches the account
    #[error("Token has already been used")]
    Superseded,
}

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Session,
    PasswordReset,
    EmailVerification,
}

impl TokenType {
    /// Lifetime used when the caller does not pick one
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Session => Duration::hours(24),
            TokenType::PasswordReset => Duration::minutes(30),
            TokenType::EmailVerification => Duration::hours(48),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Session => "session",
            TokenType::PasswordReset => "password_reset",
            TokenType::EmailVerification => "email_verification",
        }
    }
}

/// JWT claims
///
/// # Standard Claims
///
/// - `sub`: user ID
/// - `iss`: always "wfahub"
/// - `iat` / `nbf` / `exp`: Unix timestamps
///
/// # Custom Claims
///
/// - `token_type`: see [`TokenType`]
/// - `fp`: password-hash fingerprint, present on reset tokens only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fp: Option<String>,
}

impl Claims {
    /// Creates claims expiring after `expires_in`
    pub fn with_expiration(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
            fp: None,
        }
    }

    /// Session claims with the configured lifetime
    pub fn session(user_id: Uuid, ttl: Duration) -> Self {
        Self::with_expiration(user_id, TokenType::Session, ttl)
    }

    /// Password-reset claims bound to the account's current password hash
    ///
    /// Pass the output of [`crate::auth::password::hash_fingerprint`].
    pub fn password_reset(user_id: Uuid, fingerprint: String) -> Self {
        let kind = TokenType::PasswordReset;
        let mut claims = Self::with_expiration(user_id, kind, kind.default_expiration());
        claims.fp = Some(fingerprint);
        claims
    }

    pub fn email_verification(user_id: Uuid) -> Self {
        let kind = TokenType::EmailVerification;
        Self::with_expiration(user_id, kind, kind.default_expiration())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
///
/// The secret should be at least 32 bytes; configuration loading enforces that.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry, not-before and issuer, and returns the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }

    Ok(claims)
}

/// Validates a session cookie or bearer value
pub fn validate_session_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Session)
}

/// Validates an email-verification link token
pub fn validate_verification_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::EmailVerification)
}

/// Validates a password-reset token against the account's current fingerprint
///
/// Once the password changes the fingerprint no longer matches, which makes
/// each reset token single-use.
pub fn validate_reset_token(
    token: &str,
    secret: &str,
    current_fingerprint: &str,
) -> Result<Claims, JwtError> {
    let claims = validate_typed(token, secret, TokenType::PasswordReset)?;

    match claims.fp.as_deref() {
        Some(fp) if fp == current_fingerprint => Ok(claims),
        _ => Err(JwtError::Superseded),
    }
}

/// Reads the subject without verifying anything
///
/// Only for looking up the account a reset token refers to; the token must
/// still go through [`validate_reset_token`] before it is trusted.
pub fn peek_subject(token: &str, secret: &str) -> Result<Uuid, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims.sub)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-session-secret-that-is-32-bytes-long";

    #[test]
    fn test_session_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let claims = Claims::session(user_id, Duration::hours(8));
        let token = create_token(&claims, SECRET).unwrap();

        let validated = validate_session_token(&token, SECRET).unwrap();
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.iss, "wfahub");
        assert!(validated.fp.is_none());
        assert!(!validated.is_expired());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let claims = Claims::session(Uuid::new_v4(), Duration::hours(1));
        let token = create_token(&claims, SECRET).unwrap();

        let result = validate_token(&token, "another-secret-that-is-also-32-bytes");
        assert!(matches!(result, Err(JwtError::ValidationError(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let claims = Claims::with_expiration(Uuid::new_v4(), TokenType::Session, Duration::hours(-2));
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_types_do_not_cross() {
        let user_id = Uuid::new_v4();
        let verify = create_token(&Claims::email_verification(user_id), SECRET).unwrap();

        let err = validate_session_token(&verify, SECRET).unwrap_err();
        assert!(matches!(
            err,
            JwtError::WrongType {
                expected: "session",
                actual: "email_verification"
            }
        ));

        let session = create_token(&Claims::session(user_id, Duration::hours(1)), SECRET).unwrap();
        assert!(validate_verification_token(&session, SECRET).is_err());
        assert!(validate_reset_token(&session, SECRET, "abc").is_err());
    }

    #[test]
    fn test_reset_token_is_bound_to_fingerprint() {
        let user_id = Uuid::new_v4();
        let token =
            create_token(&Claims::password_reset(user_id, "0123abcd".to_string()), SECRET).unwrap();

        let claims = validate_reset_token(&token, SECRET, "0123abcd").unwrap();
        assert_eq!(claims.sub, user_id);

        assert!(matches!(
            validate_reset_token(&token, SECRET, "ffff0000"),
            Err(JwtError::Superseded)
        ));
    }

    #[test]
    fn test_default_lifetimes() {
        assert_eq!(TokenType::PasswordReset.default_expiration(), Duration::minutes(30));
        assert_eq!(TokenType::EmailVerification.default_expiration(), Duration::hours(48));

        let claims = Claims::password_reset(Uuid::new_v4(), "fp".to_string());
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn test_peek_subject() {
        let user_id = Uuid::new_v4();
        let token = create_token(&Claims::password_reset(user_id, "fp".into()), SECRET).unwrap();

        assert_eq!(peek_subject(&token, SECRET).unwrap(), user_id);
        assert!(peek_subject("not.a.token", SECRET).is_err());
    }
}

/// Session extraction for Axum
///
/// A session is a signed JWT carried in an HttpOnly cookie. API clients that
/// cannot hold cookies may send the same token as `Authorization: Bearer`.
/// The API server's middleware validates the token, reloads the user so role
/// changes and deletions apply immediately, and inserts an [`AuthContext`]
/// into the request extensions.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use wfahub_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}", auth.email)
/// }
/// ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::user::{User, UserRole};

/// Default cookie name when none is configured
pub const DEFAULT_SESSION_COOKIE: &str = "wfa_session";

/// Authenticated caller, added to request extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Error type for session authentication
#[derive(Debug)]
pub enum AuthError {
    /// No cookie and no bearer header
    MissingCredentials,

    /// Token failed validation or the user no longer exists
    InvalidToken(String),

    /// Database error
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required".to_string(),
            ),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Finds the session token on a request
///
/// The named cookie wins; otherwise a `Bearer` authorization header is used.
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = read_cookie(headers, cookie_name) {
        return Some(token);
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Reads one cookie value out of every `Cookie` header present
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Builds the `Set-Cookie` value for a fresh session
pub fn session_cookie(name: &str, token: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, token, max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Builds the `Set-Cookie` value that removes the session
pub fn clear_session_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}

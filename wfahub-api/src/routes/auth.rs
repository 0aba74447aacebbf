/// Authentication endpoints
///
/// This module provides session-based account endpoints:
/// - Registration and login (sets the session cookie)
/// - Logout (expires the cookie)
/// - Current user profile
/// - Password reset and change
/// - Email verification
///
/// # Endpoints
///
/// - `POST /api/auth/register` - Register new user
/// - `POST /api/auth/login` - Login and start a session
/// - `POST /api/auth/logout` - End the session
/// - `GET  /api/auth/me` - Current user
/// - `PUT  /api/auth/me` - Update own profile
/// - `POST /api/auth/forgot-password` - Email a reset link
/// - `POST /api/auth/reset-password` - Set a new password from a reset link
/// - `POST /api/auth/verify-email` - Confirm the email address
/// - `POST /api/auth/resend-verification` - Email a new confirmation link
/// - `POST /api/auth/change-password` - Change password while signed in

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    notify::send_system_email,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
use wfahub_shared::{
    auth::{
        jwt,
        middleware::{clear_session_cookie, session_cookie},
        password,
    },
    credits::record_signup_bonus,
    mailer::{password_reset_email, verification_email},
    models::user::{CreateUser, UpdateProfile, User},
};

/// Same answer whether or not the address has an account
const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a reset link is on its way";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (will be validated for strength)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Optional display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 200, message = "Company must be at most 200 characters"))]
    pub company: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Returned by register and login alongside the `Set-Cookie` header
///
/// `token` is the same value as the cookie, for clients that authenticate
/// with `Authorization: Bearer`.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Plain confirmation body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Signs a session token and builds the response that sets its cookie
fn start_session(state: &AppState, user: User, status: StatusCode) -> ApiResult<Response> {
    let session = &state.config.session;
    let claims = jwt::Claims::session(user.id, session.ttl());
    let token = jwt::create_token(&claims, state.session_secret())?;

    let cookie = session_cookie(
        &session.cookie_name,
        &token,
        session.max_age_seconds(),
        session.cookie_secure,
    );

    let expires_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse {
            user,
            token,
            expires_at,
        }),
    )
        .into_response())
}

fn check_password_strength(field: &str, value: &str) -> ApiResult<()> {
    password::validate_password_strength(value).map_err(|e| ApiError::invalid_field(field, e))
}

fn queue_verification_email(state: &AppState, user: &User) -> ApiResult<()> {
    let token = jwt::create_token(&jwt::Claims::email_verification(user.id), state.session_secret())?;
    let link = state.config.client_link("/verify-email", &token);

    send_system_email(
        state.db.clone(),
        verification_email(&user.email, user.name.as_deref(), &link),
    );
    Ok(())
}

/// Register a new user
///
/// Creates the account with the configured signup credits, writes the
/// signup ledger row in the same transaction, starts a session and emails a
/// verification link.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "SecureP@ss123",
///   "name": "Jane Doe",
///   "company": "Acme"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with `Set-Cookie: wfa_session=...; HttpOnly` and
///
/// ```json
/// { "user": { "id": "uuid", "email": "user@example.com", "credits": 10, ... },
///   "token": "eyJ...", "expires_at": "2026-01-08T12:00:00Z" }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed or weak password
/// - `409 Conflict`: Email already exists
/// - `429 Too Many Requests`: Rate limit exceeded
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Response> {
    req.validate()?;
    check_password_strength("password", &req.password)?;

    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email: req.email,
            password_hash,
            name: non_blank(req.name),
            company: non_blank(req.company),
            credits: state.config.limits.signup_credits,
        },
    )
    .await?;

    record_signup_bonus(&mut *tx, &user).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, "User registered");

    queue_verification_email(&state, &user)?;
    start_session(&state, user, StatusCode::CREATED)
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `429 Too Many Requests`: Rate limit exceeded
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;

    start_session(&state, user, StatusCode::OK)
}

/// Logout endpoint
///
/// Expires the session cookie. Works without a valid session.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let session = &state.config.session;
    (
        [(
            header::SET_COOKIE,
            clear_session_cookie(&session.cookie_name, session.cookie_secure),
        )],
        MessageResponse::new("Signed out"),
    )
}

/// Current user
///
/// # Endpoint
///
/// ```text
/// GET /api/auth/me
/// ```
pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// Update own profile
///
/// Omitted keys are left unchanged; `null` clears a field.
///
/// # Endpoint
///
/// ```text
/// PUT /api/auth/me
/// Content-Type: application/json
///
/// { "name": "Jane Doe", "company": null }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: A field is too long or the avatar URL is invalid
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(mut req): Json<UpdateProfile>,
) -> ApiResult<Json<User>> {
    let mut problems = Vec::new();

    for (field, value, max) in [
        ("name", &mut req.name, 100),
        ("company", &mut req.company, 200),
        ("phone", &mut req.phone, 50),
        ("avatar_url", &mut req.avatar_url, 2048),
    ] {
        // blank strings clear the column
        if let Some(inner) = value.as_mut() {
            *inner = non_blank(inner.take());
        }
        if let Some(Some(text)) = value.as_ref() {
            if text.chars().count() > max {
                problems.push((field.to_string(), format!("Must be at most {} characters", max)));
            }
        }
    }

    if let Some(Some(url)) = &req.avatar_url {
        if !validator::ValidateUrl::validate_url(url) {
            problems.push(("avatar_url".to_string(), "Must be a valid URL".to_string()));
        }
    }

    if let Some(err) = ApiError::from_problems(problems) {
        return Err(err);
    }

    let updated = User::update_profile(&state.db, user.id, req)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(updated))
}

/// Request a password reset link
///
/// Always answers 200 so the endpoint can't be used to probe for accounts.
/// The emailed token expires in 30 minutes and stops working once the
/// password changes.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/forgot-password
/// Content-Type: application/json
///
/// { "email": "user@example.com" }
/// ```
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    if let Some(user) = User::find_by_email(&state.db, &req.email).await? {
        let fingerprint = password::hash_fingerprint(&user.password_hash);
        let token = jwt::create_token(
            &jwt::Claims::password_reset(user.id, fingerprint),
            state.session_secret(),
        )?;
        let link = state.config.client_link("/reset-password", &token);

        send_system_email(
            state.db.clone(),
            password_reset_email(&user.email, user.name.as_deref(), &link),
        );
        tracing::info!(user_id = %user.id, "Password reset requested");
    }

    Ok(MessageResponse::new(RESET_REQUESTED_MESSAGE))
}

/// Set a new password from a reset link
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/reset-password
/// Content-Type: application/json
///
/// { "token": "eyJ...", "password": "NewSecureP@ss1" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Link invalid, expired or already used
/// - `422 Unprocessable Entity`: Weak password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    check_password_strength("password", &req.password)?;

    let user_id = jwt::peek_subject(&req.token, state.session_secret())?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or malformed link".to_string()))?;

    let fingerprint = password::hash_fingerprint(&user.password_hash);
    jwt::validate_reset_token(&req.token, state.session_secret(), &fingerprint)?;

    let password_hash = password::hash_password(&req.password)?;
    User::set_password(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password reset completed");
    Ok(MessageResponse::new("Password updated, you can now sign in"))
}

/// Confirm an email address
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/verify-email
/// Content-Type: application/json
///
/// { "token": "eyJ..." }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Link invalid or expired (48 hours)
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let claims = jwt::validate_verification_token(&req.token, state.session_secret())?;

    if !User::mark_email_verified(&state.db, claims.sub).await? {
        return Err(ApiError::BadRequest("Invalid or malformed link".to_string()));
    }

    tracing::info!(user_id = %claims.sub, "Email verified");
    Ok(MessageResponse::new("Email confirmed"))
}

/// Email a fresh verification link
///
/// Answers 200 whether or not the address exists or is already verified.
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    if let Some(user) = User::find_by_email(&state.db, &req.email).await? {
        if !user.email_verified {
            queue_verification_email(&state, &user)?;
        }
    }

    Ok(MessageResponse::new(
        "If the address needs confirming, a new link is on its way",
    ))
}

/// Change password while signed in
///
/// # Errors
///
/// - `401 Unauthorized`: Current password is wrong
/// - `422 Unprocessable Entity`: Weak new password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !password::verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }

    check_password_strength("new_password", &req.new_password)?;

    let password_hash = password::hash_password(&req.new_password)?;
    User::set_password(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(MessageResponse::new("Password updated"))
}

/// Trims, and maps blank strings to None
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let req = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            name: None,
            company: None,
        };

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Ana ".to_string())), Some("Ana".to_string()));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_weak_password_is_field_error() {
        match check_password_strength("new_password", "alllowercase1") {
            Err(ApiError::ValidationError(details)) => {
                assert_eq!(details[0].field, "new_password");
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}

/// User-owned SMTP configurations
///
/// A user's own configuration takes precedence over the system default when
/// executions and campaigns send email. Passwords are write-only: they are
/// never serialized, and an update with an empty password keeps the stored one.
///
/// # Endpoints
///
/// - `GET    /api/smtp-configs` - Own configurations
/// - `POST   /api/smtp-configs` - Create
/// - `PUT    /api/smtp-configs/:id` - Update
/// - `DELETE /api/smtp-configs/:id` - Delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use wfahub_shared::{
    auth::middleware::AuthContext,
    models::smtp_config::{SmtpConfig, SmtpConfigInput},
};

/// 422 from the input's own checks
pub(crate) fn check_input(input: &SmtpConfigInput, creating: bool) -> ApiResult<()> {
    match ApiError::from_problems(input.problems(creating)) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("SMTP configuration not found".to_string())
}

pub async fn list_smtp_configs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<SmtpConfig>>> {
    let configs = SmtpConfig::list(&state.db, Some(auth.user_id)).await?;
    Ok(Json(configs))
}

/// Create an SMTP configuration
///
/// # Endpoint
///
/// ```text
/// POST /api/smtp-configs
/// Content-Type: application/json
///
/// {
///   "name": "Office",
///   "host": "smtp.example.com",
///   "port": 587,
///   "username": "sales@example.com",
///   "password": "app-password",
///   "from_email": "sales@example.com",
///   "from_name": "Sales",
///   "use_tls": true
/// }
/// ```
pub async fn create_smtp_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<SmtpConfigInput>,
) -> ApiResult<(StatusCode, Json<SmtpConfig>)> {
    check_input(&input, true)?;

    let config = SmtpConfig::create(&state.db, Some(auth.user_id), input).await?;
    tracing::info!(user_id = %auth.user_id, smtp_config_id = %config.id, "SMTP configuration created");

    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn update_smtp_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<SmtpConfigInput>,
) -> ApiResult<Json<SmtpConfig>> {
    check_input(&input, false)?;

    let config = SmtpConfig::update(&state.db, id, Some(auth.user_id), input)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(config))
}

pub async fn delete_smtp_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !SmtpConfig::delete(&state.db, id, Some(auth.user_id)).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

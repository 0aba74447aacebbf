/// System SMTP configurations
///
/// System configurations have no owner. The one marked default sends account
/// emails and serves every user without a configuration of their own.
///
/// # Endpoints
///
/// - `GET    /api/admin/smtp-configs` - System configurations
/// - `POST   /api/admin/smtp-configs` - Create
/// - `PUT    /api/admin/smtp-configs/:id` - Update
/// - `DELETE /api/admin/smtp-configs/:id` - Delete
/// - `POST   /api/admin/smtp-configs/:id/default` - Make it the system default

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::smtp::check_input,
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

fn not_found() -> ApiError {
    ApiError::NotFound("SMTP configuration not found".to_string())
}

pub async fn list_system_configs(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SmtpConfig>>> {
    let configs = SmtpConfig::list(&state.db, None).await?;
    Ok(Json(configs))
}

pub async fn create_system_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<SmtpConfigInput>,
) -> ApiResult<(StatusCode, Json<SmtpConfig>)> {
    check_input(&input, true)?;

    let config = SmtpConfig::create(&state.db, None, input).await?;
    tracing::info!(admin_id = %auth.user_id, smtp_config_id = %config.id, "System SMTP configuration created");

    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn update_system_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SmtpConfigInput>,
) -> ApiResult<Json<SmtpConfig>> {
    check_input(&input, false)?;

    let config = SmtpConfig::update(&state.db, id, None, input)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(config))
}

pub async fn delete_system_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !SmtpConfig::delete(&state.db, id, None).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Make a system configuration the default
///
/// Clears the flag on every other configuration.
///
/// # Errors
///
/// - `404 Not Found`: Unknown id, or a user-owned configuration
pub async fn set_default(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SmtpConfig>> {
    let config = SmtpConfig::set_system_default(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(admin_id = %auth.user_id, smtp_config_id = %id, "System default SMTP configuration changed");
    Ok(Json(config))
}

/// Application settings and policy pages
///
/// # Endpoints
///
/// - `GET /api/admin/settings` - PDF method and menu defaults
/// - `PUT /api/admin/settings` - Update either or both
/// - `PUT /api/admin/policies/:slug` - Create or replace a policy page

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use wfahub_shared::{
    auth::middleware::AuthContext,
    models::{
        app_settings::{AppSettings, MenuVisibility, PdfGenerationSetting},
        policy_page::{is_valid_slug, PolicyPage, PolicyPageInput},
    },
};

/// Partial settings update; omitted keys keep their stored value
#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub pdf_generation: Option<PdfGenerationSetting>,

    #[serde(default)]
    pub menu_defaults: Option<MenuVisibility>,
}

impl SettingsUpdate {
    fn apply(self, settings: &mut AppSettings) {
        if let Some(pdf) = self.pdf_generation {
            settings.pdf_generation = pdf;
        }
        if let Some(menu) = self.menu_defaults {
            settings.menu_defaults = menu;
        }
    }
}

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<AppSettings>> {
    let settings = AppSettings::load(&state.db).await?;
    Ok(Json(settings))
}

/// Update application settings
///
/// # Endpoint
///
/// ```text
/// PUT /api/admin/settings
/// Content-Type: application/json
///
/// { "pdf_generation": { "method": "api" }, "menu_defaults": { "campaigns": true } }
/// ```
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<AppSettings>> {
    let mut settings = AppSettings::load(&state.db).await?;
    update.apply(&mut settings);
    settings.save(&state.db).await?;

    tracing::info!(
        admin_id = %auth.user_id,
        pdf_method = settings.pdf_generation.method.as_str(),
        "Settings updated"
    );
    Ok(Json(settings))
}

/// Create or replace a policy page
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Slug not lowercase letters, digits and dashes,
///   or blank title
pub async fn upsert_policy(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<PolicyPageInput>,
) -> ApiResult<Json<PolicyPage>> {
    let mut problems = Vec::new();
    if !is_valid_slug(&slug) {
        problems.push((
            "slug".to_string(),
            "Use lowercase letters, digits and dashes".to_string(),
        ));
    }
    if input.title.trim().is_empty() {
        problems.push(("title".to_string(), "Title is required".to_string()));
    }
    if let Some(err) = ApiError::from_problems(problems) {
        return Err(err);
    }

    let page = PolicyPage::upsert(&state.db, &slug, input).await?;
    Ok(Json(page))
}

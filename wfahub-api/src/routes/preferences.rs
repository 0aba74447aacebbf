/// Per-user UI preferences
///
/// Each user has an explicit preferences row (created on first write) holding
/// their view mode and menu-visibility overrides. The effective menu is the
/// admin defaults with the user's overrides laid on top.
///
/// # Endpoints
///
/// - `GET /api/preferences` - Own preferences plus the effective menu
/// - `PUT /api/preferences` - Update view mode and/or menu overrides

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use serde::Serialize;
use wfahub_shared::{
    auth::middleware::AuthContext,
    models::{
        app_settings::{AppSettings, MenuVisibility},
        user_preferences::{UpdatePreferences, UserPreferences, ViewMode},
    },
};

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub view_mode: ViewMode,

    /// The user's own overrides
    pub menu_visibility: MenuVisibility,

    /// Admin defaults overlaid by the overrides
    pub effective_menu: MenuVisibility,
}

async fn respond(state: &AppState, prefs: UserPreferences) -> ApiResult<Json<PreferencesResponse>> {
    let defaults = AppSettings::menu_defaults(&state.db).await?;
    let effective_menu = prefs.effective_menu(&defaults);

    Ok(Json(PreferencesResponse {
        view_mode: prefs.view_mode,
        menu_visibility: prefs.menu_visibility.0,
        effective_menu,
    }))
}

pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<PreferencesResponse>> {
    let prefs = UserPreferences::get(&state.db, auth.user_id).await?;
    respond(&state, prefs).await
}

/// Update own preferences
///
/// # Endpoint
///
/// ```text
/// PUT /api/preferences
/// Content-Type: application/json
///
/// { "view_mode": "list", "menu_visibility": { "campaigns": false } }
/// ```
///
/// Omitted keys keep their stored value; `menu_visibility` replaces the
/// stored overrides as a whole.
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(update): Json<UpdatePreferences>,
) -> ApiResult<Json<PreferencesResponse>> {
    let prefs = UserPreferences::upsert(&state.db, auth.user_id, update).await?;
    respond(&state, prefs).await
}

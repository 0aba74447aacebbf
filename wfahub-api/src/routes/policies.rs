/// Public policy pages
///
/// # Endpoints
///
/// - `GET /api/policies/:slug` - Page by slug (no session needed)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Json,
};
use wfahub_shared::models::policy_page::{is_valid_slug, PolicyPage};

pub async fn get_policy(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PolicyPage>> {
    if !is_valid_slug(&slug) {
        return Err(ApiError::NotFound("Policy page not found".to_string()));
    }

    let page = PolicyPage::find(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Policy page not found".to_string()))?;
    Ok(Json(page))
}

/// Template catalog for signed-in users
///
/// Users only ever see active templates. Inactive ones answer 404 as if they
/// didn't exist; admins manage the full catalog under `/api/admin/templates`.
///
/// # Endpoints
///
/// - `GET /api/templates?category=sales` - Active templates, optionally by category
/// - `GET /api/templates/:id` - One active template with its input schema

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use wfahub_shared::models::template::Template;

#[derive(Debug, Deserialize)]
pub struct TemplateFilter {
    pub category: Option<String>,
}

/// List active templates
///
/// # Response
///
/// ```json
/// [{ "id": "uuid", "name": "Quote request", "category": "sales",
///    "credit_cost": 2, "input_schema": [...], "action": { "type": "record_only" }, ... }]
/// ```
pub async fn list_templates(
    State(state): State<AppState>,
    Query(filter): Query<TemplateFilter>,
) -> ApiResult<Json<Vec<Template>>> {
    let category = filter
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let templates = Template::list_active(&state.db, category).await?;
    Ok(Json(templates))
}

/// Get one active template
///
/// # Errors
///
/// - `404 Not Found`: Unknown or inactive template
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Template>> {
    let template = find_active(&state, id).await?;
    Ok(Json(template))
}

/// Loads a template users may run
pub(crate) async fn find_active(state: &AppState, id: Uuid) -> ApiResult<Template> {
    Template::find_by_id(&state.db, id)
        .await?
        .filter(|t| t.is_active)
        .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))
}

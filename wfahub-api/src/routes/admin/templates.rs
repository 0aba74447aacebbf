/// Template catalog management
///
/// Admins see inactive templates too. Deleting a template keeps its execution
/// history; the logs just lose the link.
///
/// # Endpoints
///
/// - `GET    /api/admin/templates` - Every template
/// - `POST   /api/admin/templates` - Create
/// - `PUT    /api/admin/templates/:id` - Replace
/// - `DELETE /api/admin/templates/:id` - Delete

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
    models::template::{Template, TemplateInput},
};

fn check(input: &TemplateInput) -> ApiResult<()> {
    match ApiError::from_problems(input.problems()) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Template not found".to_string())
}

pub async fn list_templates(State(state): State<AppState>) -> ApiResult<Json<Vec<Template>>> {
    let templates = Template::list_all(&state.db).await?;
    Ok(Json(templates))
}

/// Create a template
///
/// # Endpoint
///
/// ```text
/// POST /api/admin/templates
/// Content-Type: application/json
///
/// {
///   "name": "Send quote",
///   "category": "sales",
///   "credit_cost": 2,
///   "input_schema": [
///     { "name": "client_email", "type": "email", "required": true },
///     { "name": "amount", "type": "number", "required": true }
///   ],
///   "action": {
///     "type": "send_email",
///     "to_field": "client_email",
///     "subject": "Your quote",
///     "html_body": "<p>Total: {amount}</p>"
///   }
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Blank name, negative cost, duplicate field
///   names, or an email action pointing at a missing field
pub async fn create_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<TemplateInput>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    check(&input)?;

    let template = Template::create(&state.db, input, auth.user_id).await?;
    tracing::info!(admin_id = %auth.user_id, template_id = %template.id, "Template created");

    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<TemplateInput>,
) -> ApiResult<Json<Template>> {
    check(&input)?;

    let template = Template::update(&state.db, id, input)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Template::delete(&state.db, id).await? {
        return Err(not_found());
    }

    tracing::info!(admin_id = %auth.user_id, template_id = %id, "Template deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Template execution and execution history
///
/// Running a template is pre-paid: the inputs are validated against the
/// template's schema, the credit cost is deducted together with a pending
/// execution log, and then the template's action runs. If the action fails
/// the log is marked failed and the credits go back in one transaction.
/// Either way the response carries the finished log and the new balance.
///
/// # Endpoints
///
/// - `POST /api/templates/:id/execute` - Run a template
/// - `GET  /api/executions` - Own execution history (paginated, newest first)
/// - `GET  /api/executions/:id` - One execution

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{templates::find_active, Page},
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use uuid::Uuid;
use wfahub_shared::{
    auth::middleware::AuthContext,
    credits::{charge_for_execution, refund_execution},
    mailer::{Mailer, OutgoingEmail},
    models::{
        execution_log::{ExecutionLog, ExecutionStatus},
        smtp_config::SmtpConfig,
        template::TemplateAction,
        Pagination,
    },
    schema::validate_inputs,
    templating,
};

/// Execute request
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Field name → submitted value
    #[serde(default)]
    pub inputs: JsonValue,
}

/// Execute response
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub execution: ExecutionLog,

    /// Balance after the charge (and refund, if the action failed)
    pub credits: i32,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<ExecutionStatus>,
}

/// Run a template
///
/// # Endpoint
///
/// ```text
/// POST /api/templates/:id/execute
/// Content-Type: application/json
///
/// { "inputs": { "client_email": "ana@example.com", "amount": "120" } }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "execution": { "id": "uuid", "status": "success", "credits_charged": 2, ... },
///   "credits": 8
/// }
/// ```
///
/// A failed action still answers 200: `execution.status` is `failed`,
/// `credits_refunded` equals the charge and `credits` shows the restored balance.
///
/// # Errors
///
/// - `402 Payment Required`: Balance below the template cost (nothing is charged)
/// - `404 Not Found`: Unknown or inactive template
/// - `422 Unprocessable Entity`: Inputs don't match the schema (per-field details)
pub async fn execute_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(template_id): Path<Uuid>,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<Json<ExecuteResponse>> {
    let template = find_active(&state, template_id).await?;

    let values = validate_inputs(&template.input_schema, &req.inputs)?;
    let input_data = json!(values);

    let charge = charge_for_execution(
        &state.db,
        auth.user_id,
        template.id,
        template.credit_cost,
        &input_data,
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        template_id = %template.id,
        execution_id = %charge.execution_id,
        cost = template.credit_cost,
        "Template execution charged"
    );

    let credits = match run_action(&state, auth.user_id, &template.action, &values).await {
        Ok(result) => {
            ExecutionLog::mark_success(&state.db, charge.execution_id, &result).await?;
            charge.balance_after
        }
        Err(message) => {
            tracing::warn!(
                execution_id = %charge.execution_id,
                error = %message,
                "Template action failed, refunding"
            );
            refund_execution(
                &state.db,
                auth.user_id,
                charge.execution_id,
                template.credit_cost,
                &message,
            )
            .await?
            .unwrap_or(charge.balance_after)
        }
    };

    let execution = ExecutionLog::find_by_id(&state.db, charge.execution_id)
        .await?
        .ok_or_else(|| ApiError::InternalError("Execution log vanished".to_string()))?;

    Ok(Json(ExecuteResponse { execution, credits }))
}

/// Performs a template's action; the error string is stored on the log
async fn run_action(
    state: &AppState,
    user_id: Uuid,
    action: &TemplateAction,
    values: &BTreeMap<String, String>,
) -> Result<JsonValue, String> {
    match action {
        TemplateAction::RecordOnly => Ok(json!({ "action": "record_only" })),
        TemplateAction::SendEmail {
            subject,
            html_body,
            to_field,
        } => {
            let to = values
                .get(to_field)
                .ok_or_else(|| format!("Recipient field '{}' is empty", to_field))?;

            let smtp = SmtpConfig::resolve_for_user(&state.db, user_id, None)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "SMTP lookup failed");
                    "Could not load the SMTP configuration".to_string()
                })?
                .ok_or_else(|| "No SMTP configuration is available".to_string())?;

            let email = OutgoingEmail::html(
                to.as_str(),
                templating::render(subject, values),
                templating::render_html(html_body, values),
            );

            Mailer::from_config(&smtp)
                .map_err(|e| e.to_string())?
                .send(&email)
                .await
                .map_err(|e| e.to_string())?;

            Ok(json!({
                "action": "send_email",
                "sent_to": to,
                "subject": email.subject,
                "smtp_config_id": smtp.id,
            }))
        }
    }
}

/// Own execution history
///
/// # Endpoint
///
/// ```text
/// GET /api/executions?page=1&per_page=20&status=failed
/// ```
pub async fn list_executions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Page<ExecutionLog>>> {
    let items = ExecutionLog::list(
        &state.db,
        Some(auth.user_id),
        filter.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = ExecutionLog::count(&state.db, Some(auth.user_id), filter.status).await?;

    Ok(Json(Page::new(items, total, &pagination)))
}

/// One execution; admins may read anyone's
///
/// # Errors
///
/// - `404 Not Found`: Unknown execution, or another user's
pub async fn get_execution(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExecutionLog>> {
    let log = ExecutionLog::find_by_id(&state.db, id)
        .await?
        .filter(|log| log.user_id == auth.user_id || auth.is_admin())
        .ok_or_else(|| ApiError::NotFound("Execution not found".to_string()))?;

    Ok(Json(log))
}

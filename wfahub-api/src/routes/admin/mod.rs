/// Admin console
///
/// Every route here sits behind the session layer and `require_admin_layer`,
/// so handlers can assume an admin caller.
///
/// # Endpoints
///
/// - `/api/admin/users` - See [`users`]
/// - `/api/admin/templates` - See [`templates`]
/// - `/api/admin/smtp-configs` - See [`smtp`]
/// - `/api/admin/settings`, `/api/admin/policies/:slug` - See [`settings`]
/// - `GET /api/admin/executions?status=failed` - Every user's executions
/// - `GET /api/admin/analytics` - System-wide totals and top templates

pub mod settings;
pub mod smtp;
pub mod templates;
pub mod users;

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{executions::StatusFilter, Page},
};
use axum::{
    extract::{Query, State},
    Json,
};
use wfahub_shared::models::{
    analytics::{self, AdminSummary},
    execution_log::ExecutionLog,
    Pagination,
};

/// Templates listed in the analytics ranking
const TOP_TEMPLATES: i64 = 5;

pub async fn list_executions(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Page<ExecutionLog>>> {
    let items = ExecutionLog::list(
        &state.db,
        None,
        filter.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = ExecutionLog::count(&state.db, None, filter.status).await?;

    Ok(Json(Page::new(items, total, &pagination)))
}

pub async fn analytics(State(state): State<AppState>) -> ApiResult<Json<AdminSummary>> {
    let summary = analytics::admin_summary(&state.db, TOP_TEMPLATES).await?;
    Ok(Json(summary))
}

/// Personal dashboard numbers
///
/// # Endpoints
///
/// - `GET /api/analytics/summary` - Own execution, credit and campaign totals

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use wfahub_shared::{
    auth::middleware::AuthContext,
    models::analytics::{self, UserSummary},
};

pub async fn user_summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserSummary>> {
    let summary = analytics::user_summary(&state.db, auth.user_id).await?;
    Ok(Json(summary))
}

/// User management
///
/// # Endpoints
///
/// - `GET    /api/admin/users?search=acme` - Paginated, newest first
/// - `GET    /api/admin/users/:id` - One user
/// - `DELETE /api/admin/users/:id` - Delete (not yourself)
/// - `PUT    /api/admin/users/:id/credits` - Set or add credits
/// - `PUT    /api/admin/users/:id/role` - Promote or demote (not yourself)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{auth::non_blank, Page},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use wfahub_shared::{
    auth::{authorization::ensure_not_self, middleware::AuthContext},
    credits::{adjust_balance, Adjustment},
    models::{
        user::{User, UserRole},
        Pagination,
    },
};

#[derive(Debug, Deserialize)]
pub struct UserSearch {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustMode {
    Set,
    Add,
}

#[derive(Debug, Deserialize)]
pub struct AdjustCreditsRequest {
    pub mode: AdjustMode,
    pub amount: i32,

    /// Shown in the user's ledger
    #[serde(default)]
    pub description: Option<String>,
}

impl AdjustCreditsRequest {
    fn adjustment(&self) -> Adjustment {
        match self.mode {
            AdjustMode::Set => Adjustment::Set(self.amount),
            AdjustMode::Add => Adjustment::Add(self.amount),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: UserRole,
}

fn not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(query): Query<UserSearch>,
) -> ApiResult<Json<Page<User>>> {
    let search = non_blank(query.search);
    let items = User::list(
        &state.db,
        search.as_deref(),
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = User::count(&state.db, search.as_deref()).await?;

    Ok(Json(Page::new(items, total, &pagination)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(user))
}

/// Delete a user with everything they own
///
/// # Errors
///
/// - `403 Forbidden`: The admin targeted their own account
/// - `404 Not Found`: Unknown user
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ensure_not_self(&auth, id, "delete")?;

    if !User::delete(&state.db, id).await? {
        return Err(not_found());
    }

    tracing::info!(admin_id = %auth.user_id, user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Set or add credits
///
/// # Endpoint
///
/// ```text
/// PUT /api/admin/users/:id/credits
/// Content-Type: application/json
///
/// { "mode": "add", "amount": -5, "description": "Chargeback" }
/// ```
///
/// `add` clamps the balance at zero; `set` rejects negative amounts. Every
/// change is written to the user's ledger as an admin adjustment.
///
/// # Response
///
/// The user with the new balance.
pub async fn adjust_credits(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdjustCreditsRequest>,
) -> ApiResult<Json<User>> {
    let description = non_blank(req.description.clone())
        .or_else(|| Some(format!("Adjusted by {}", auth.email)));

    adjust_balance(&state.db, id, req.adjustment(), description).await?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(user))
}

pub async fn change_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<User>> {
    ensure_not_self(&auth, id, "change the role of")?;

    let user = User::update_role(&state.db, id, req.role)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(
        admin_id = %auth.user_id,
        user_id = %id,
        role = req.role.as_str(),
        "User role changed"
    );
    Ok(Json(user))
}

/// Credit ledger
///
/// # Endpoints
///
/// - `GET /api/credits/transactions` - Own ledger (paginated, newest first)

use crate::{app::AppState, error::ApiResult, routes::Page};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Serialize;
use wfahub_shared::models::{credit_transaction::CreditTransaction, user::User, Pagination};

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    /// Current balance
    pub credits: i32,

    #[serde(flatten)]
    pub page: Page<CreditTransaction>,
}

/// Own credit ledger
///
/// # Response
///
/// ```json
/// {
///   "credits": 7,
///   "items": [{ "amount": -3, "balance_after": 7, "kind": "execution_charge", ... }],
///   "total": 2, "page": 1, "per_page": 20
/// }
/// ```
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<LedgerResponse>> {
    let items = CreditTransaction::list_for_user(
        &state.db,
        user.id,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = CreditTransaction::count_for_user(&state.db, user.id).await?;

    Ok(Json(LedgerResponse {
        credits: user.credits,
        page: Page::new(items, total, &pagination),
    }))
}

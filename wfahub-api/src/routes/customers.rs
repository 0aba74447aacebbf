/// Per-user address book
///
/// Customers are private to the user who created them; another user's id
/// answers 404.
///
/// # Endpoints
///
/// - `GET    /api/customers?search=acme` - List (sorted by name)
/// - `POST   /api/customers` - Create
/// - `GET    /api/customers/:id` - Read
/// - `PUT    /api/customers/:id` - Replace
/// - `DELETE /api/customers/:id` - Delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use wfahub_shared::{
    auth::middleware::AuthContext,
    models::customer::{Customer, CustomerInput},
};

#[derive(Debug, Deserialize)]
pub struct CustomerSearch {
    pub search: Option<String>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Customer not found".to_string())
}

fn check(input: &CustomerInput) -> ApiResult<()> {
    match ApiError::from_problems(input.problems()) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CustomerSearch>,
) -> ApiResult<Json<Vec<Customer>>> {
    let customers = Customer::list(&state.db, auth.user_id, query.search.as_deref()).await?;
    Ok(Json(customers))
}

/// Create a customer
///
/// # Endpoint
///
/// ```text
/// POST /api/customers
/// Content-Type: application/json
///
/// { "name": "Ana Lima", "email": "ana@example.com", "company": "Lima & Co" }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Missing name or invalid email
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    check(&input)?;

    let customer = Customer::create(&state.db, auth.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    let customer = Customer::find(&state.db, auth.user_id, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(customer))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<Json<Customer>> {
    check(&input)?;

    let customer = Customer::update(&state.db, auth.user_id, id, input)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Customer::delete(&state.db, auth.user_id, id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

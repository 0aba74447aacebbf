/// Customer address book
///
/// Every query is scoped by the owning user's id, so one user can never read
/// or modify another user's customers even with a guessed id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::normalize_email;

const CUSTOMER_COLUMNS: &str =
    "id, user_id, name, email, company, phone, notes, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub email: String,

    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl CustomerInput {
    pub fn problems(&self) -> Vec<(String, String)> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push(("name".to_string(), "Name is required".to_string()));
        }
        if !crate::schema::is_valid_email(self.email.trim()) {
            problems.push(("email".to_string(), "Invalid email address".to_string()));
        }
        problems
    }
}

impl Customer {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: CustomerInput,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO customers (user_id, name, email, company, phone, notes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            CUSTOMER_COLUMNS
        );

        sqlx::query_as::<_, Customer>(&query)
            .bind(user_id)
            .bind(data.name.trim())
            .bind(normalize_email(&data.email))
            .bind(data.company)
            .bind(data.phone)
            .bind(data.notes)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        id: Uuid,
        data: CustomerInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE customers SET name = $3, email = $4, company = $5, phone = $6, notes = $7, \
             updated_at = NOW() WHERE id = $1 AND user_id = $2 RETURNING {}",
            CUSTOMER_COLUMNS
        );

        sqlx::query_as::<_, Customer>(&query)
            .bind(id)
            .bind(user_id)
            .bind(data.name.trim())
            .bind(normalize_email(&data.email))
            .bind(data.company)
            .bind(data.phone)
            .bind(data.notes)
            .fetch_optional(pool)
            .await
    }

    pub async fn find(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM customers WHERE id = $1 AND user_id = $2",
            CUSTOMER_COLUMNS
        );

        sqlx::query_as::<_, Customer>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Customers sorted by name, optionally filtered by name/email/company text
    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM customers WHERE user_id = $1 AND ($2::TEXT IS NULL \
             OR name ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%' \
             OR company ILIKE '%' || $2 || '%') ORDER BY name",
            CUSTOMER_COLUMNS
        );

        sqlx::query_as::<_, Customer>(&query)
            .bind(user_id)
            .bind(search.filter(|s| !s.trim().is_empty()))
            .fetch_all(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Execution logs
///
/// One row per template run. The row is inserted in the same transaction that
/// deducts credits (status `pending`), and is finalized exactly once: either
/// `success` with a result payload, or `failed` with an error message and the
/// refunded amount.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::UnknownVariant;

const LOG_COLUMNS: &str = "l.id, l.user_id, l.template_id, t.name AS template_name, l.status, \
     l.credits_charged, l.credits_refunded, l.input_data, l.result_data, l.error_message, \
     l.created_at, l.completed_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl TryFrom<String> for ExecutionStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(ExecutionStatus::Pending),
            "success" => Ok(ExecutionStatus::Success),
            "failed" => Ok(ExecutionStatus::Failed),
            _ => Err(UnknownVariant::new("execution status", value)),
        }
    }
}

/// One template run, joined with the template name for display
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExecutionLog {
    pub id: Uuid,
    pub user_id: Uuid,

    /// NULL once the template has been deleted
    pub template_id: Option<Uuid>,
    pub template_name: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: ExecutionStatus,

    pub credits_charged: i32,
    pub credits_refunded: i32,
    pub input_data: JsonValue,
    pub result_data: Option<JsonValue>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionLog {
    /// Credits this run actually cost after any refund
    pub fn net_cost(&self) -> i32 {
        self.credits_charged - self.credits_refunded
    }

    /// Inserts a pending log; returns its id
    pub async fn insert_pending(
        conn: &mut PgConnection,
        user_id: Uuid,
        template_id: Uuid,
        credits_charged: i32,
        input_data: &JsonValue,
    ) -> Result<Uuid, sqlx::Error> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO execution_logs (user_id, template_id, status, credits_charged, input_data)
            VALUES ($1, $2, 'pending', $3, $4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(template_id)
        .bind(credits_charged)
        .bind(input_data)
        .fetch_one(conn)
        .await?;

        Ok(id)
    }

    /// Finalizes a pending log as successful
    ///
    /// Returns false when the log was already finalized.
    pub async fn mark_success(
        pool: &PgPool,
        id: Uuid,
        result_data: &JsonValue,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE execution_logs
            SET status = 'success', result_data = $2, completed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(result_data)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Finalizes a pending log as failed, recording the refund
    pub async fn mark_failed(
        conn: &mut PgConnection,
        id: Uuid,
        error_message: &str,
        credits_refunded: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE execution_logs
            SET status = 'failed', error_message = $2, credits_refunded = $3, completed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .bind(credits_refunded)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM execution_logs l LEFT JOIN templates t ON t.id = l.template_id \
             WHERE l.id = $1",
            LOG_COLUMNS
        );

        sqlx::query_as::<_, ExecutionLog>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists logs newest first; `user_id = None` lists every user's logs
    pub async fn list(
        pool: &PgPool,
        user_id: Option<Uuid>,
        status: Option<ExecutionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM execution_logs l LEFT JOIN templates t ON t.id = l.template_id \
             WHERE ($1::UUID IS NULL OR l.user_id = $1) AND ($2::TEXT IS NULL OR l.status = $2) \
             ORDER BY l.created_at DESC LIMIT $3 OFFSET $4",
            LOG_COLUMNS
        );

        sqlx::query_as::<_, ExecutionLog>(&query)
            .bind(user_id)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(
        pool: &PgPool,
        user_id: Option<Uuid>,
        status: Option<ExecutionStatus>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM execution_logs \
             WHERE ($1::UUID IS NULL OR user_id = $1) AND ($2::TEXT IS NULL OR status = $2)",
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}

/// Campaign recipients
///
/// One row per projected data row of a campaign. `variables` holds the
/// field → value map the HTML template is merged with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgConnection, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::UnknownVariant;

const RECIPIENT_COLUMNS: &str =
    "id, campaign_id, email, variables, status, attempts, last_error, sent_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
}

impl RecipientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientStatus::Pending => "pending",
            RecipientStatus::Sent => "sent",
            RecipientStatus::Failed => "failed",
        }
    }
}

impl TryFrom<String> for RecipientStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(RecipientStatus::Pending),
            "sent" => Ok(RecipientStatus::Sent),
            "failed" => Ok(RecipientStatus::Failed),
            _ => Err(UnknownVariant::new("recipient status", value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CampaignRecipient {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub email: String,
    pub variables: Json<BTreeMap<String, String>>,

    #[sqlx(try_from = "String")]
    pub status: RecipientStatus,

    pub attempts: i32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Projected row to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipient {
    pub email: String,
    pub variables: BTreeMap<String, String>,
}

impl CampaignRecipient {
    /// Inserts all recipients of a new campaign with one statement
    pub async fn insert_batch(
        conn: &mut PgConnection,
        campaign_id: Uuid,
        recipients: &[NewRecipient],
    ) -> Result<u64, sqlx::Error> {
        if recipients.is_empty() {
            return Ok(0);
        }

        let emails: Vec<&str> = recipients.iter().map(|r| r.email.as_str()).collect();
        let variables: Vec<serde_json::Value> = recipients
            .iter()
            .map(|r| serde_json::to_value(&r.variables).unwrap_or_default())
            .collect();

        let result = sqlx::query(
            r#"
            INSERT INTO campaign_recipients (campaign_id, email, variables)
            SELECT $1, email, variables
            FROM UNNEST($2::TEXT[], $3::JSONB[]) AS t(email, variables)
            "#,
        )
        .bind(campaign_id)
        .bind(&emails)
        .bind(&variables)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn list(
        pool: &PgPool,
        campaign_id: Uuid,
        status: Option<RecipientStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM campaign_recipients \
             WHERE campaign_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY email LIMIT $3 OFFSET $4",
            RECIPIENT_COLUMNS
        );

        sqlx::query_as::<_, CampaignRecipient>(&query)
            .bind(campaign_id)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Total behind [`CampaignRecipient::list`] with the same filter
    pub async fn count(
        pool: &PgPool,
        campaign_id: Uuid,
        status: Option<RecipientStatus>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM campaign_recipients \
             WHERE campaign_id = $1 AND ($2::TEXT IS NULL OR status = $2)",
        )
        .bind(campaign_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_one(pool)
        .await
    }

    /// Next batch of unsent recipients for the worker
    pub async fn next_pending(
        pool: &PgPool,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM campaign_recipients WHERE campaign_id = $1 AND status = 'pending' \
             ORDER BY id LIMIT $2",
            RECIPIENT_COLUMNS
        );

        sqlx::query_as::<_, CampaignRecipient>(&query)
            .bind(campaign_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// pending → sent; false if it was already finalized
    pub async fn mark_sent(
        conn: &mut PgConnection,
        id: Uuid,
        attempts: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaign_recipients SET status = 'sent', attempts = $2, sent_at = NOW(), \
             last_error = NULL WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(attempts)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// pending → failed; false if it was already finalized
    pub async fn mark_failed(
        conn: &mut PgConnection,
        id: Uuid,
        attempts: i32,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaign_recipients SET status = 'failed', attempts = $2, last_error = $3 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(attempts)
        .bind(error)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [RecipientStatus::Pending, RecipientStatus::Sent, RecipientStatus::Failed] {
            assert_eq!(RecipientStatus::try_from(status.as_str().to_string()).unwrap(), status);
        }
        assert!(RecipientStatus::try_from("bounced".to_string()).is_err());
    }
}

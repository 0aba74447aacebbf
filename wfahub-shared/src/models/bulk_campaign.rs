/// Bulk email campaigns
///
/// # Lifecycle
///
/// ```text
/// draft ──schedule──▶ scheduled ──worker claims──▶ sending ──▶ completed
///   ▲                    │                              └─────▶ failed
///   └──────cancel────────┘
/// ```
///
/// Counters only move forward, one recipient at a time, and the table's
/// `CHECK (sent_count + failed_count <= total_recipients)` backs up the guard
/// in [`BulkCampaign::record_outcome`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;

use super::UnknownVariant;
use crate::mapping::FieldMapping;

const CAMPAIGN_COLUMNS: &str = "id, user_id, name, subject, html_template, field_mappings, \
     attach_pdf, pdf_filename, smtp_config_id, status, total_recipients, sent_count, \
     failed_count, scheduled_at, started_at, completed_at, last_error, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Completed,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }
}

impl TryFrom<String> for CampaignStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sending" => Ok(CampaignStatus::Sending),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(UnknownVariant::new("campaign status", value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BulkCampaign {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub subject: String,
    pub html_template: String,

    /// Confirmed mapping, kept for audit
    pub field_mappings: Json<Vec<FieldMapping>>,

    pub attach_pdf: bool,
    pub pdf_filename: Option<String>,
    pub smtp_config_id: Option<Uuid>,

    #[sqlx(try_from = "String")]
    pub status: CampaignStatus,

    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkCampaign {
    /// Recipients not yet sent or failed
    pub fn remaining(&self) -> i32 {
        (self.total_recipients - self.sent_count - self.failed_count).max(0)
    }
}

/// Draft to insert; recipients are inserted alongside
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub user_id: Uuid,
    pub name: String,
    pub subject: String,
    pub html_template: String,
    pub field_mappings: Vec<FieldMapping>,
    pub attach_pdf: bool,
    pub pdf_filename: Option<String>,
    pub smtp_config_id: Option<Uuid>,
    pub total_recipients: i32,
}

impl BulkCampaign {
    pub async fn insert_draft(
        conn: &mut PgConnection,
        data: NewCampaign,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO bulk_campaigns (user_id, name, subject, html_template, field_mappings, \
             attach_pdf, pdf_filename, smtp_config_id, total_recipients) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            CAMPAIGN_COLUMNS
        );

        sqlx::query_as::<_, BulkCampaign>(&query)
            .bind(data.user_id)
            .bind(data.name)
            .bind(data.subject)
            .bind(data.html_template)
            .bind(Json(data.field_mappings))
            .bind(data.attach_pdf)
            .bind(data.pdf_filename)
            .bind(data.smtp_config_id)
            .bind(data.total_recipients)
            .fetch_one(conn)
            .await
    }

    pub async fn find(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM bulk_campaigns WHERE id = $1 AND user_id = $2",
            CAMPAIGN_COLUMNS
        );

        sqlx::query_as::<_, BulkCampaign>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM bulk_campaigns WHERE id = $1", CAMPAIGN_COLUMNS);

        sqlx::query_as::<_, BulkCampaign>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM bulk_campaigns WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            CAMPAIGN_COLUMNS
        );

        sqlx::query_as::<_, BulkCampaign>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM bulk_campaigns WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// draft → scheduled; `scheduled_at = None` means as soon as possible
    ///
    /// Returns None if the campaign isn't a draft owned by the user.
    pub async fn schedule(
        pool: &PgPool,
        user_id: Uuid,
        id: Uuid,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE bulk_campaigns SET status = 'scheduled', \
             scheduled_at = COALESCE($3, NOW()), updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND status = 'draft' RETURNING {}",
            CAMPAIGN_COLUMNS
        );

        sqlx::query_as::<_, BulkCampaign>(&query)
            .bind(id)
            .bind(user_id)
            .bind(scheduled_at)
            .fetch_optional(pool)
            .await
    }

    /// scheduled → draft, only before a worker has claimed it
    pub async fn cancel(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE bulk_campaigns SET status = 'draft', scheduled_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND status = 'scheduled' RETURNING {}",
            CAMPAIGN_COLUMNS
        );

        sqlx::query_as::<_, BulkCampaign>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a campaign that isn't currently sending
    pub async fn delete(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM bulk_campaigns WHERE id = $1 AND user_id = $2 AND status <> 'sending'",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Claims up to `limit` due campaigns for this worker (scheduled → sending)
    ///
    /// `FOR UPDATE SKIP LOCKED` lets several workers poll concurrently without
    /// claiming the same campaign.
    pub async fn claim_due(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "WITH due AS ( \
                 SELECT id FROM bulk_campaigns \
                 WHERE status = 'scheduled' AND (scheduled_at IS NULL OR scheduled_at <= NOW()) \
                 ORDER BY scheduled_at NULLS FIRST, created_at \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             UPDATE bulk_campaigns c \
             SET status = 'sending', started_at = COALESCE(c.started_at, NOW()), updated_at = NOW() \
             FROM due WHERE c.id = due.id \
             RETURNING {}",
            CAMPAIGN_COLUMNS
                .split(", ")
                .map(|col| format!("c.{}", col))
                .collect::<Vec<_>>()
                .join(", ")
        );

        sqlx::query_as::<_, BulkCampaign>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Counts one recipient outcome against the campaign
    ///
    /// Returns false when the counters are already exhausted, which keeps
    /// `sent_count + failed_count <= total_recipients` under concurrent workers.
    pub async fn record_outcome(
        conn: &mut PgConnection,
        id: Uuid,
        sent: bool,
    ) -> Result<bool, sqlx::Error> {
        let query = if sent {
            "UPDATE bulk_campaigns SET sent_count = sent_count + 1, updated_at = NOW() \
             WHERE id = $1 AND sent_count + failed_count < total_recipients"
        } else {
            "UPDATE bulk_campaigns SET failed_count = failed_count + 1, updated_at = NOW() \
             WHERE id = $1 AND sent_count + failed_count < total_recipients"
        };

        let result = sqlx::query(query).bind(id).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// sending → completed, or failed when nothing was delivered
    pub async fn finish(
        pool: &PgPool,
        id: Uuid,
        last_error: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE bulk_campaigns SET \
             status = CASE WHEN sent_count = 0 AND total_recipients > 0 THEN 'failed' ELSE 'completed' END, \
             last_error = COALESCE($2, last_error), completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'sending' RETURNING {}",
            CAMPAIGN_COLUMNS
        );

        sqlx::query_as::<_, BulkCampaign>(&query)
            .bind(id)
            .bind(last_error)
            .fetch_optional(pool)
            .await
    }

    /// Fails a claimed campaign outright (e.g. no SMTP configuration)
    ///
    /// Every still-pending recipient is counted as failed. Returns None and
    /// changes nothing when the campaign is not in `sending`.
    pub async fn abort(pool: &PgPool, id: Uuid, error: &str) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let failed = sqlx::query(
            "UPDATE campaign_recipients SET status = 'failed', last_error = $2 \
             WHERE campaign_id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(error)
        .execute(&mut *tx)
        .await?
        .rows_affected() as i32;

        let query = format!(
            "UPDATE bulk_campaigns SET status = 'failed', \
             failed_count = LEAST(failed_count + $2, total_recipients - sent_count), \
             last_error = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'sending' RETURNING {}",
            CAMPAIGN_COLUMNS
        );

        let campaign = sqlx::query_as::<_, BulkCampaign>(&query)
            .bind(id)
            .bind(failed)
            .bind(error)
            .fetch_optional(&mut *tx)
            .await?;

        // not ours to abort any more; leave its recipients alone
        if campaign.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(campaign)
    }

    /// Returns campaigns stuck in `sending` to `scheduled` so a worker can
    /// pick them up again (used at worker startup after a crash)
    pub async fn requeue_stale(pool: &PgPool, older_than_minutes: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulk_campaigns SET status = 'scheduled', updated_at = NOW() \
             WHERE status = 'sending' AND updated_at < NOW() - ($1 || ' minutes')::INTERVAL",
        )
        .bind(older_than_minutes.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_and_terminal() {
        for status in [
            CampaignStatus::Draft,
            CampaignStatus::Scheduled,
            CampaignStatus::Sending,
            CampaignStatus::Completed,
            CampaignStatus::Failed,
        ] {
            assert_eq!(CampaignStatus::try_from(status.as_str().to_string()).unwrap(), status);
        }

        assert!(CampaignStatus::Completed.is_terminal());
        assert!(CampaignStatus::Failed.is_terminal());
        assert!(!CampaignStatus::Sending.is_terminal());
        assert!(CampaignStatus::try_from("paused".to_string()).is_err());
    }

    #[test]
    fn test_claim_query_qualifies_columns() {
        let qualified = CAMPAIGN_COLUMNS
            .split(", ")
            .map(|col| format!("c.{}", col))
            .collect::<Vec<_>>()
            .join(", ");
        assert!(qualified.starts_with("c.id, c.user_id"));
        assert!(qualified.ends_with("c.updated_at"));
    }
}

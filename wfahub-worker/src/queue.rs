/// Campaign queue
///
/// Wraps the campaign and recipient queries the worker needs. A recipient's
/// final status and the campaign counter it feeds are written in the same
/// transaction.
///
/// # Architecture
///
/// The queue:
/// 1. Claims due campaigns atomically (scheduled → sending, `SKIP LOCKED`)
/// 2. Hands out pending recipients in id order
/// 3. Finalizes each recipient once and counts it against the campaign
/// 4. Finishes, aborts or releases campaigns
///
/// # Example
///
/// ```no_run
/// use wfahub_worker::queue::CampaignQueue;
/// use sqlx::{PgConnection, PgPool};
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = CampaignQueue::new(pool);
///
/// for campaign in queue.claim(2).await? {
///     let recipients = queue.next_recipients(campaign.id).await?;
///     println!("{}: {} pending", campaign.name, recipients.len());
/// }
/// # Ok(())
/// # }
/// ```

use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use uuid::Uuid;
use wfahub_shared::models::bulk_campaign::BulkCampaign;
use wfahub_shared::models::campaign_recipient::CampaignRecipient;

/// Default number of recipients fetched per round
pub const DEFAULT_RECIPIENT_BATCH: i64 = 50;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct CampaignQueue {
    db: PgPool,

    /// Recipients fetched per round
    batch_size: i64,
}

impl CampaignQueue {
    pub fn new(db: PgPool) -> Self {
        CampaignQueue {
            db,
            batch_size: DEFAULT_RECIPIENT_BATCH,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    /// Claims up to `limit` due campaigns for this worker
    pub async fn claim(&self, limit: usize) -> Result<Vec<BulkCampaign>, QueueError> {
        let campaigns = BulkCampaign::claim_due(&self.db, limit as i64).await?;

        if !campaigns.is_empty() {
            tracing::info!(count = campaigns.len(), "Claimed campaigns");
        }

        Ok(campaigns)
    }

    pub async fn next_recipients(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<CampaignRecipient>, QueueError> {
        Ok(CampaignRecipient::next_pending(&self.db, campaign_id, self.batch_size).await?)
    }

    /// Marks the recipient sent and counts it in one transaction; a recipient
    /// already finalized elsewhere is not counted twice
    pub async fn record_sent(
        &self,
        campaign_id: Uuid,
        recipient: &CampaignRecipient,
        attempts: i32,
    ) -> Result<(), QueueError> {
        let mut tx = self.db.begin().await?;
        if CampaignRecipient::mark_sent(&mut *tx, recipient.id, attempts).await? {
            count_outcome(&mut *tx, campaign_id, true).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn record_failed(
        &self,
        campaign_id: Uuid,
        recipient: &CampaignRecipient,
        attempts: i32,
        error: &str,
    ) -> Result<(), QueueError> {
        let mut tx = self.db.begin().await?;
        if CampaignRecipient::mark_failed(&mut *tx, recipient.id, attempts, error).await? {
            count_outcome(&mut *tx, campaign_id, false).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// sending → completed (or failed when nothing went out)
    pub async fn finish(
        &self,
        campaign_id: Uuid,
        last_error: Option<&str>,
    ) -> Result<Option<BulkCampaign>, QueueError> {
        Ok(BulkCampaign::finish(&self.db, campaign_id, last_error).await?)
    }

    /// Fails the campaign and every still-pending recipient
    pub async fn abort(
        &self,
        campaign_id: Uuid,
        error: &str,
    ) -> Result<Option<BulkCampaign>, QueueError> {
        let campaign = BulkCampaign::abort(&self.db, campaign_id, error).await?;
        tracing::warn!(campaign_id = %campaign_id, error, "Campaign aborted");
        Ok(campaign)
    }

    /// sending → scheduled, so another poll (of any worker) resumes it
    pub async fn release(&self, campaign_id: Uuid) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE bulk_campaigns
            SET status = 'scheduled', updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(campaign_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Requeues campaigns a crashed worker left in `sending`
    pub async fn requeue_stale(&self, older_than_minutes: i64) -> Result<u64, QueueError> {
        let requeued = BulkCampaign::requeue_stale(&self.db, older_than_minutes).await?;

        if requeued > 0 {
            tracing::warn!(count = requeued, "Requeued stale campaigns");
        }

        Ok(requeued)
    }

    /// Recipients still waiting across all campaigns
    pub async fn pending_count(&self) -> Result<i64, QueueError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM campaign_recipients WHERE status = 'pending'")
                .fetch_one(&self.db)
                .await?;

        Ok(count)
    }
}

async fn count_outcome(conn: &mut PgConnection, campaign_id: Uuid, sent: bool) -> Result<(), QueueError> {
    if !BulkCampaign::record_outcome(conn, campaign_id, sent).await? {
        tracing::warn!(
            campaign_id = %campaign_id,
            sent,
            "Campaign counters already exhausted, outcome not counted"
        );
    }
    Ok(())
}

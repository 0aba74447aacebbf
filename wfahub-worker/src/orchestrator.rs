/// Worker orchestrator
///
/// This module implements the main worker loop that sends bulk campaigns.
/// It polls for due campaigns, resolves a sender for each, delivers every
/// pending recipient with retries, and finalizes the campaign.
///
/// # Architecture
///
/// ```text
/// Orchestrator
///   ├─> CampaignQueue: Claim due campaigns (scheduled → sending)
///   ├─> SenderProvider: Resolve the SMTP sender for the campaign
///   ├─> compose: Merge subject and body per recipient
///   ├─> PdfRenderer: Optional per-recipient attachment
///   ├─> RetryPolicy: Deliver with backoff on transient failures
///   └─> CampaignQueue: Record outcomes, finish the campaign
/// ```
///
/// # Concurrency
///
/// Up to `max_concurrent_campaigns` campaigns run at once, each in its own
/// Tokio task. Within a campaign at most `max_concurrent_sends` messages are
/// in flight.
///
/// # Shutdown
///
/// Cancelling the shutdown token stops claiming, lets in-flight sends finish,
/// and puts unfinished campaigns back to `scheduled` so the next worker
/// resumes them from their remaining pending recipients.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use wfahub_worker::config::OrchestratorConfig;
/// use wfahub_worker::orchestrator::WorkerOrchestrator;
/// use wfahub_worker::senders::SmtpSenderProvider;
/// use wfahub_shared::pdf::PdfRenderer;
/// # use wfahub_shared::pdf::PdfOptions;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, pdf: PdfOptions) -> anyhow::Result<()> {
/// let provider = Arc::new(SmtpSenderProvider::new(pool.clone()));
/// let orchestrator = WorkerOrchestrator::new(
///     pool,
///     provider,
///     PdfRenderer::new(pdf),
///     OrchestratorConfig::default(),
/// );
///
/// orchestrator.run().await?;
/// # Ok(())
/// # }
/// ```

use crate::compose;
use crate::config::OrchestratorConfig;
use crate::queue::CampaignQueue;
use crate::retry::{Delivery, RetryPolicy};
use crate::senders::{Sender, SenderProvider};
use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use wfahub_shared::mailer::EmailAttachment;
use wfahub_shared::models::app_settings::{AppSettings, PdfMethod};
use wfahub_shared::models::bulk_campaign::BulkCampaign;
use wfahub_shared::models::campaign_recipient::CampaignRecipient;
use wfahub_shared::pdf::{attachment_filename, PdfRenderer};

/// Worker orchestrator
///
/// Coordinates campaign sending by polling the queue and running one job per
/// claimed campaign.
pub struct WorkerOrchestrator {
    queue: CampaignQueue,
    provider: Arc<dyn SenderProvider>,
    pdf: PdfRenderer,
    config: OrchestratorConfig,
    shutdown_token: CancellationToken,
}

impl WorkerOrchestrator {
    pub fn new(
        db: PgPool,
        provider: Arc<dyn SenderProvider>,
        pdf: PdfRenderer,
        config: OrchestratorConfig,
    ) -> Self {
        WorkerOrchestrator {
            queue: CampaignQueue::new(db),
            provider,
            pdf,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets shutdown token
    ///
    /// Used to signal graceful shutdown from external handlers.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs the worker loop until shutdown
    ///
    /// Claim failures are logged and retried after the poll interval; they
    /// never end the loop. On shutdown, active campaigns are awaited.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            max_concurrent_campaigns = self.config.max_concurrent_campaigns,
            max_concurrent_sends = self.config.max_concurrent_sends,
            "Worker orchestrator starting"
        );

        let mut active: JoinSet<()> = JoinSet::new();

        while !self.shutdown_token.is_cancelled() {
            let free = self
                .config
                .max_concurrent_campaigns
                .saturating_sub(active.len());

            let mut saturated = false;
            if free > 0 {
                match self.queue.claim(free).await {
                    Ok(campaigns) => {
                        saturated = campaigns.len() == free;
                        for campaign in campaigns {
                            let job = self.job();
                            active.spawn(async move { job.process(campaign).await });
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to claim campaigns"),
                }
            }

            // Everything asked for was due: there may be more, so poll again
            // as soon as a slot frees up instead of sleeping.
            if saturated && active.len() < self.config.max_concurrent_campaigns {
                continue;
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {}
                Some(joined) = active.join_next(), if !active.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Campaign job panicked");
                    }
                }
                _ = sleep(self.config.poll_interval) => {}
            }
        }

        if !active.is_empty() {
            tracing::info!(count = active.len(), "Shutdown requested, waiting for active campaigns");
        }
        while let Some(joined) = active.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Campaign job panicked");
            }
        }

        tracing::info!("Worker orchestrator shut down");
        Ok(())
    }

    fn job(&self) -> CampaignJob {
        CampaignJob {
            queue: self.queue.clone(),
            provider: self.provider.clone(),
            pdf: self.pdf.clone(),
            retry: RetryPolicy::new(self.config.max_attempts, self.config.retry_backoff),
            max_concurrent_sends: self.config.max_concurrent_sends,
            shutdown: self.shutdown_token.clone(),
        }
    }
}

/// Everything one campaign needs, owned so it can run on its own task
struct CampaignJob {
    queue: CampaignQueue,
    provider: Arc<dyn SenderProvider>,
    pdf: PdfRenderer,
    retry: RetryPolicy,
    max_concurrent_sends: usize,
    shutdown: CancellationToken,
}

impl CampaignJob {
    async fn process(self, campaign: BulkCampaign) {
        let campaign_id = campaign.id;

        tracing::info!(
            campaign_id = %campaign_id,
            name = %campaign.name,
            remaining = campaign.remaining(),
            "Sending campaign"
        );

        if let Err(e) = self.send(&campaign).await {
            tracing::error!(campaign_id = %campaign_id, error = %e, "Campaign interrupted, releasing");
            if let Err(e) = self.queue.release(campaign_id).await {
                tracing::error!(campaign_id = %campaign_id, error = %e, "Failed to release campaign");
            }
        }
    }

    /// Delivers every pending recipient, then finishes the campaign
    ///
    /// Errors are storage errors; the caller releases the campaign so that a
    /// later poll resumes it.
    async fn send(&self, campaign: &BulkCampaign) -> anyhow::Result<()> {
        let sender = match self.provider.sender_for(campaign).await {
            Ok(sender) => sender,
            Err(e) if e.is_fatal() => {
                self.queue.abort(campaign.id, &e.to_string()).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let pdf_method = if campaign.attach_pdf {
            Some(AppSettings::pdf_method(self.queue.pool()).await?)
        } else {
            None
        };

        let mut last_error: Option<String> = None;

        loop {
            if self.shutdown.is_cancelled() {
                self.queue.release(campaign.id).await?;
                tracing::info!(campaign_id = %campaign.id, "Campaign released for shutdown");
                return Ok(());
            }

            let batch = self.queue.next_recipients(campaign.id).await?;
            if batch.is_empty() {
                break;
            }

            let outcomes: Vec<anyhow::Result<Option<String>>> = stream::iter(batch)
                .map(|recipient| self.deliver(campaign, sender.as_ref(), pdf_method, recipient))
                .buffer_unordered(self.max_concurrent_sends)
                .collect()
                .await;

            for outcome in outcomes {
                if let Some(error) = outcome? {
                    last_error = Some(error);
                }
            }
        }

        match self.queue.finish(campaign.id, last_error.as_deref()).await? {
            Some(done) => tracing::info!(
                campaign_id = %done.id,
                status = done.status.as_str(),
                sent = done.sent_count,
                failed = done.failed_count,
                "Campaign finished"
            ),
            None => tracing::warn!(
                campaign_id = %campaign.id,
                "Campaign left the sending state before it could be finished"
            ),
        }

        Ok(())
    }

    /// Sends to one recipient and records the outcome
    ///
    /// Returns the recipient's error when it failed.
    async fn deliver(
        &self,
        campaign: &BulkCampaign,
        sender: &dyn Sender,
        pdf_method: Option<PdfMethod>,
        recipient: CampaignRecipient,
    ) -> anyhow::Result<Option<String>> {
        let mut email = compose::merge(campaign, &recipient);

        if let Some(method) = pdf_method {
            match self.pdf.render(method, &email.html).await {
                Ok(bytes) => {
                    let filename = attachment_filename(campaign.pdf_filename.as_deref());
                    email = email.with_attachment(EmailAttachment::pdf(filename, bytes));
                }
                Err(e) => {
                    let error = format!("PDF generation failed: {}", e);
                    self.queue
                        .record_failed(campaign.id, &recipient, recipient.attempts, &error)
                        .await?;
                    return Ok(Some(error));
                }
            }
        }

        match self.retry.deliver(sender, &email, &self.shutdown).await {
            Delivery::Sent { attempts } => {
                let attempts = recipient.attempts + attempts as i32;
                self.queue.record_sent(campaign.id, &recipient, attempts).await?;
                tracing::debug!(
                    campaign_id = %campaign.id,
                    to = %recipient.email,
                    attempts,
                    "Message sent"
                );
                Ok(None)
            }
            Delivery::Failed { attempts, error } => {
                let attempts = recipient.attempts + attempts as i32;
                self.queue
                    .record_failed(campaign.id, &recipient, attempts, &error)
                    .await?;
                tracing::warn!(
                    campaign_id = %campaign.id,
                    to = %recipient.email,
                    attempts,
                    error = %error,
                    "Message failed"
                );
                Ok(Some(error))
            }
            Delivery::Interrupted => Ok(None),
        }
    }
}

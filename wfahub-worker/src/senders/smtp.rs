/// SMTP delivery through the shared mailer

use crate::senders::{SendResult, Sender, SenderError, SenderProvider};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use wfahub_shared::mailer::{Mailer, OutgoingEmail};
use wfahub_shared::models::bulk_campaign::BulkCampaign;
use wfahub_shared::models::smtp_config::SmtpConfig;

/// Sender bound to one SMTP configuration
pub struct SmtpSender {
    mailer: Mailer,
    config_id: Uuid,
}

impl SmtpSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, SenderError> {
        let mailer = Mailer::from_config(config)
            .map_err(|e| SenderError::InvalidConfiguration(e.to_string()))?;

        Ok(SmtpSender {
            mailer,
            config_id: config.id,
        })
    }

    pub fn config_id(&self) -> Uuid {
        self.config_id
    }
}

#[async_trait]
impl Sender for SmtpSender {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> SendResult<()> {
        self.mailer.send(email).await?;
        Ok(())
    }
}

/// Resolves the campaign's SMTP configuration from the database
///
/// Resolution order: the configuration chosen on the campaign (if the owner
/// may use it), the owner's own, then the system default.
#[derive(Clone)]
pub struct SmtpSenderProvider {
    db: PgPool,
}

impl SmtpSenderProvider {
    pub fn new(db: PgPool) -> Self {
        SmtpSenderProvider { db }
    }
}

#[async_trait]
impl SenderProvider for SmtpSenderProvider {
    async fn sender_for(&self, campaign: &BulkCampaign) -> Result<Arc<dyn Sender>, SenderError> {
        let config = SmtpConfig::resolve_for_user(&self.db, campaign.user_id, campaign.smtp_config_id)
            .await?
            .ok_or(SenderError::NoConfiguration)?;

        tracing::debug!(
            campaign_id = %campaign.id,
            smtp_config_id = %config.id,
            host = %config.host,
            "Resolved SMTP configuration"
        );

        Ok(Arc::new(SmtpSender::new(&config)?))
    }
}

/// Core Sender trait and types
///
/// A sender delivers one message and classifies failures: transient errors
/// (timeouts, 4xx replies) are retried by the orchestrator, permanent ones are
/// recorded against the recipient straight away.
///
/// # Example
///
/// ```no_run
/// use wfahub_worker::senders::{SendResult, Sender};
/// use wfahub_shared::mailer::OutgoingEmail;
/// use async_trait::async_trait;
///
/// struct StdoutSender;
///
/// #[async_trait]
/// impl Sender for StdoutSender {
///     fn name(&self) -> &str {
///         "stdout"
///     }
///
///     async fn send(&self, email: &OutgoingEmail) -> SendResult<()> {
///         println!("{} <- {}", email.to, email.subject);
///         Ok(())
///     }
/// }
/// ```

use async_trait::async_trait;
use std::sync::Arc;
use wfahub_shared::mailer::{MailError, OutgoingEmail};
use wfahub_shared::models::bulk_campaign::BulkCampaign;

/// Failure to deliver one message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// Worth another attempt
    #[error("{0}")]
    Transient(String),

    /// Retrying won't help (bad address, rejected message, auth failure)
    #[error("{0}")]
    Permanent(String),
}

impl SendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SendError::Transient(_))
    }
}

impl From<MailError> for SendError {
    fn from(err: MailError) -> Self {
        if err.is_transient() {
            SendError::Transient(err.to_string())
        } else {
            SendError::Permanent(err.to_string())
        }
    }
}

pub type SendResult<T> = Result<T, SendError>;

/// Why no sender could be built for a campaign
#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("No SMTP configuration is available")]
    NoConfiguration,

    #[error("Invalid SMTP configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SenderError {
    /// Whether the campaign should be failed rather than retried later
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SenderError::Database(_))
    }
}

#[async_trait]
pub trait Sender: Send + Sync {
    /// Used in logs
    fn name(&self) -> &str;

    async fn send(&self, email: &OutgoingEmail) -> SendResult<()>;
}

/// Picks the sender for a campaign once, before its recipients are processed
#[async_trait]
pub trait SenderProvider: Send + Sync {
    async fn sender_for(&self, campaign: &BulkCampaign) -> Result<Arc<dyn Sender>, SenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_errors_keep_their_class() {
        let timeout = MailError::Transport {
            message: "timed out".to_string(),
            transient: true,
        };
        assert_eq!(SendError::from(timeout), SendError::Transient("SMTP error: timed out".to_string()));

        let rejected = MailError::InvalidAddress("nope".to_string());
        assert!(!SendError::from(rejected).is_transient());
    }

    #[test]
    fn test_only_database_errors_are_retryable() {
        assert!(SenderError::NoConfiguration.is_fatal());
        assert!(SenderError::InvalidConfiguration("port".to_string()).is_fatal());
        assert!(!SenderError::Database(sqlx::Error::PoolTimedOut).is_fatal());
    }
}

/// Account emails (verification, password reset)
///
/// These go out through the system default SMTP configuration. Sending runs
/// on a spawned task so the request never waits on the SMTP server, and a
/// missing or broken configuration is logged rather than surfaced: the
/// account operation itself has already succeeded.

use sqlx::PgPool;
use wfahub_shared::mailer::{Mailer, OutgoingEmail};
use wfahub_shared::models::smtp_config::SmtpConfig;

/// Queues an email on the system SMTP server
pub fn send_system_email(db: PgPool, email: OutgoingEmail) {
    tokio::spawn(async move {
        if let Err(e) = deliver(&db, &email).await {
            tracing::warn!(to = %email.to, subject = %email.subject, error = %e, "Account email not sent");
        }
    });
}

async fn deliver(db: &PgPool, email: &OutgoingEmail) -> anyhow::Result<()> {
    let config = SmtpConfig::find_system_default(db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no system default SMTP configuration"))?;

    Mailer::from_config(&config)?.send(email).await?;

    tracing::info!(to = %email.to, smtp_config_id = %config.id, "Account email sent");
    Ok(())
}

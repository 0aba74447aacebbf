/// Outgoing email over SMTP
///
/// A [`Mailer`] is built per [`SmtpConfig`] row. STARTTLS is used when the
/// config asks for TLS, plaintext otherwise. Messages are HTML with an
/// optional attachment (the rendered PDF for quotation campaigns).
///
/// Send failures carry a transient flag so the worker can tell a retryable
/// 4xx or timeout from a permanent rejection.
///
/// # Example
///
/// ```no_run
/// use wfahub_shared::mailer::{Mailer, OutgoingEmail};
/// use wfahub_shared::models::smtp_config::SmtpConfig;
///
/// # async fn example(config: SmtpConfig) -> Result<(), Box<dyn std::error::Error>> {
/// let mailer = Mailer::from_config(&config)?;
///
/// mailer
///     .send(&OutgoingEmail::html("client@example.com", "Your quote", "<p>Hello</p>"))
///     .await?;
/// # Ok(())
/// # }
/// ```

use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::models::smtp_config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid SMTP configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {message}")]
    Transport { message: String, transient: bool },
}

impl MailError {
    /// Whether a later retry might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, MailError::Transport { transient: true, .. })
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        MailError::Transport {
            transient: err.is_transient() || err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// File attached to a message
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl EmailAttachment {
    pub fn pdf(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: "application/pdf".to_string(),
            data,
        }
    }
}

/// One message to one recipient
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachment: Option<EmailAttachment>,
}

impl OutgoingEmail {
    pub fn html(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: EmailAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// SMTP sender bound to one configuration
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
        let port = u16::try_from(config.port)
            .map_err(|_| MailError::InvalidConfig(format!("port {} out of range", config.port)))?;

        if !config.use_tls {
            tracing::warn!(
                smtp_config_id = %config.id,
                host = %config.host,
                "SMTP TLS is disabled for this configuration"
            );
        }

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::InvalidConfig(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: sender_mailbox(config)?,
        })
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = build_message(&self.from, email)?;
        self.transport.send(message).await?;

        tracing::debug!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

fn sender_mailbox(config: &SmtpConfig) -> Result<Mailbox, MailError> {
    let address = config
        .from_email
        .parse()
        .map_err(|_| MailError::InvalidAddress(config.from_email.clone()))?;

    let name = config
        .from_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Ok(Mailbox::new(name, address))
}

/// Assembles the MIME message
pub fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<Message, MailError> {
    let to: Mailbox = email
        .to
        .trim()
        .parse()
        .map_err(|_| MailError::InvalidAddress(email.to.clone()))?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.clone());

    let message = match &email.attachment {
        None => builder
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone()),
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| MailError::Build(e.to_string()))?;

            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(email.html.clone()))
                    .singlepart(
                        Attachment::new(attachment.filename.clone())
                            .body(attachment.data.clone(), content_type),
                    ),
            )
        }
    };

    message.map_err(|e| MailError::Build(e.to_string()))
}

/// Account verification message
pub fn verification_email(to: &str, name: Option<&str>, link: &str) -> OutgoingEmail {
    let body = account_email_body(
        "Confirm your email",
        name,
        "Thanks for signing up for WFA Hub. Please confirm your email address:",
        link,
        "Confirm email",
        "This link expires in 48 hours.",
    );
    OutgoingEmail::html(to, "Confirm your WFA Hub email", body)
}

/// Password reset message
pub fn password_reset_email(to: &str, name: Option<&str>, link: &str) -> OutgoingEmail {
    let body = account_email_body(
        "Password reset",
        name,
        "We received a request to reset your password. If you didn't make it, ignore this email.",
        link,
        "Reset your password",
        "This link expires in 30 minutes.",
    );
    OutgoingEmail::html(to, "Reset your WFA Hub password", body)
}

fn account_email_body(
    title: &str,
    name: Option<&str>,
    intro: &str,
    link: &str,
    button: &str,
    footer: &str,
) -> String {
    let greeting = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hello {},", crate::templating::escape_html(name)),
        None => "Hello,".to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>{title}</h2>
    <p>{greeting}</p>
    <p>{intro}</p>
    <p><a href="{link}">{button}</a></p>
    <p>Or paste this link into your browser:<br>{link}</p>
    <p style="font-size: 12px; color: #666;">{footer}</p>
  </div>
</body>
</html>"#
    )
}

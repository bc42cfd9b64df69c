//! Email delivery.
//!
//! [`SmtpEmailGateway`] sends through the `lettre` async SMTP transport.
//! When `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns `None` and
//! the server falls back to [`InMemoryEmailGateway`], which only keeps the
//! messages (the `notifications` table still records them).

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// The gateway refused the message without trying to send it.
    #[error("Email gateway unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A plain-text email ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            cc: Vec::new(),
            reply_to: None,
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }
}

/// Sends emails.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), EmailError>;
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "ne-pas-ecrire-a-cet-email@immersion-facile.beta.gouv.fr";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" mailbox.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured.
    ///
    /// | Variable        | Required | Default                     |
    /// |-----------------|----------|-----------------------------|
    /// | `SMTP_HOST`     | yes      | --                          |
    /// | `SMTP_PORT`     | no       | `587`                       |
    /// | `SMTP_FROM`     | no       | platform no-reply address   |
    /// | `SMTP_USER`     | no       | --                          |
    /// | `SMTP_PASSWORD` | no       | --                          |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// SmtpEmailGateway
// ---------------------------------------------------------------------------

pub struct SmtpEmailGateway {
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailGateway {
    /// Build the transport once; connections are pooled by `lettre`.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            from: config.from_address.parse()?,
            mailer: builder.build(),
        })
    }
}

/// Assemble the MIME message for `email`.
pub fn build_message(from: &Mailbox, email: &EmailMessage) -> Result<Message, EmailError> {
    if email.to.is_empty() {
        return Err(EmailError::Build("no recipient".to_string()));
    }

    let mut builder = Message::builder()
        .from(from.clone())
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    for to in &email.to {
        builder = builder.to(to.parse()?);
    }
    for cc in &email.cc {
        builder = builder.cc(cc.parse()?);
    }
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(reply_to.parse()?);
    }

    builder
        .body(email.body.clone())
        .map_err(|e| EmailError::Build(e.to_string()))
}

#[async_trait]
impl EmailGateway for SmtpEmailGateway {
    async fn send(&self, email: &EmailMessage) -> Result<(), EmailError> {
        let message = build_message(&self.from, email)?;
        self.mailer.send(message).await?;

        tracing::info!(to = ?email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryEmailGateway
// ---------------------------------------------------------------------------

/// Keeps sent emails in memory. Used in tests and when SMTP is not
/// configured.
#[derive(Default)]
pub struct InMemoryEmailGateway {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<bool>,
}

impl InMemoryEmailGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emails sent so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Make every following `send` fail until reset.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }
}

#[async_trait]
impl EmailGateway for InMemoryEmailGateway {
    async fn send(&self, email: &EmailMessage) -> Result<(), EmailError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(EmailError::Unavailable("in-memory gateway set to fail".into()));
        }
        tracing::debug!(to = ?email.to, subject = %email.subject, "Email kept in memory");
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

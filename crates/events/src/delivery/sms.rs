//! SMS delivery through an HTTP transactional SMS API.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// HTTP request timeout for a single SMS.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_SENDER: &str = "ImmerFacile";

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("SMS API returned HTTP {0}")]
    HttpStatus(u16),

    /// The phone number cannot be turned into an international number.
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("SMS gateway unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    /// Normalised digits, as stored on the convention.
    pub phone: String,
    pub text: String,
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, sms: &SmsMessage) -> Result<(), SmsError>;
}

/// Convert a stored phone number to the international form the SMS API
/// expects (digits only, country code first). French national numbers
/// (`0X XX XX XX XX`) get the `33` prefix.
pub fn to_international(phone: &str) -> Result<String, SmsError> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if phone.trim_start().starts_with('+') {
        return Ok(digits);
    }
    match digits.strip_prefix('0') {
        Some(national) if digits.len() == 10 => Ok(format!("33{national}")),
        _ if digits.len() >= 11 => Ok(digits),
        _ => Err(SmsError::InvalidPhone(phone.to_string())),
    }
}

// ---------------------------------------------------------------------------
// SmsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender: String,
}

impl SmsConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` unless both `SMS_API_URL` and `SMS_API_KEY` are set.
    /// `SMS_SENDER` defaults to `ImmerFacile`.
    pub fn from_env() -> Option<Self> {
        let api_url = std::env::var("SMS_API_URL").ok()?;
        let api_key = std::env::var("SMS_API_KEY").ok()?;
        Some(Self {
            api_url,
            api_key,
            sender: std::env::var("SMS_SENDER").unwrap_or_else(|_| DEFAULT_SENDER.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// HttpSmsGateway
// ---------------------------------------------------------------------------

pub struct HttpSmsGateway {
    client: reqwest::Client,
    config: SmsConfig,
}

impl HttpSmsGateway {
    pub fn new(config: SmsConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, sms: &SmsMessage) -> Result<(), SmsError> {
        let recipient = to_international(&sms.phone)?;
        let body = serde_json::json!({
            "sender": self.config.sender,
            "recipient": recipient,
            "content": sms.text,
            "type": "transactional",
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SmsError::HttpStatus(response.status().as_u16()));
        }

        tracing::info!(recipient = %recipient, "SMS sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemorySmsGateway
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySmsGateway {
    sent: Mutex<Vec<SmsMessage>>,
}

impl InMemorySmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SmsGateway for InMemorySmsGateway {
    async fn send(&self, sms: &SmsMessage) -> Result<(), SmsError> {
        to_international(&sms.phone)?;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(sms.clone());
        }
        Ok(())
    }
}

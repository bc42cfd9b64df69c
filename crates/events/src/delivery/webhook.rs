//! Operational alerts posted to a chat webhook with exponential-backoff
//! retry.
//!
//! [`MonitoringNotifier`] posts `{ "content": ... }` (Discord/Mattermost
//! format) to `MONITORING_WEBHOOK_URL`. Without a URL, alerts are only
//! logged.

use std::time::Duration;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord rejects longer messages.
const MAX_CONTENT_LENGTH: usize = 1900;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

#[derive(Clone)]
pub struct MonitoringNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl MonitoringNotifier {
    pub fn new(url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, url }
    }

    /// Reads `MONITORING_WEBHOOK_URL`; empty means disabled.
    pub fn from_env() -> Self {
        let url = std::env::var("MONITORING_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.trim().is_empty());
        Self::new(url)
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Send an alert, retrying up to 3 times with exponential backoff.
    ///
    /// The alert is always logged at `error` level first.
    pub async fn alert(&self, title: &str, details: &serde_json::Value) -> Result<(), WebhookError> {
        tracing::error!(title, details = %details, "Monitoring alert");

        let Some(url) = self.url.as_deref() else {
            return Ok(());
        };
        let payload = serde_json::json!({ "content": format_content(title, details) });

        let mut last_err: Option<WebhookError> = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(url, &payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Monitoring webhook attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        match self.try_send(url, &payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Monitoring webhook failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    async fn try_send(&self, url: &str, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

fn format_content(title: &str, details: &serde_json::Value) -> String {
    let details = serde_json::to_string_pretty(details).unwrap_or_default();
    let mut content = format!("**{title}**\n```json\n{details}\n```");
    if content.len() > MAX_CONTENT_LENGTH {
        let mut cut = MAX_CONTENT_LENGTH;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        content.truncate(cut);
        content.push_str("\n[truncated]");
    }
    content
}

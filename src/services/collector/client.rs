use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PublishError;
use crate::outputs::sink::PublishSink;

/// HTTP publish sink. POSTs each record to `<base_url>/<topic>`.
///
/// Retries transport errors and 5xx with exponential backoff. Every attempt
/// for one record carries the same `Idempotency-Key` so the collector can
/// drop duplicates.
#[derive(Clone)]
pub struct CollectorClient {
    client: Client,
    base_url: String,
    max_attempts: u32,
    backoff: Duration,
}

impl CollectorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn url_for(&self, topic: &str) -> String {
        format!("{}/{}", self.base_url, topic.trim_start_matches('/'))
    }

    async fn attempt(&self, url: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("Idempotency-Key", key)
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PublishError::Rejected { status: status.as_u16() })
        }
    }
}

fn is_retryable(err: &PublishError) -> bool {
    match err {
        PublishError::Transport(_) => true,
        PublishError::Rejected { status } => {
            StatusCode::from_u16(*status).map(|s| s.is_server_error()).unwrap_or(false)
                || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
        }
        _ => false,
    }
}

impl PublishSink for CollectorClient {
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let url = self.url_for(topic);
        let key = Uuid::new_v4().to_string();
        let mut delay = self.backoff;
        let mut attempt = 1;

        loop {
            match self.attempt(&url, &key, payload).await {
                Ok(()) => {
                    debug!(%url, attempt, "record delivered");
                    return Ok(());
                }
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    warn!(%url, attempt, error = %e, retry_in_ms = delay.as_millis() as u64, "collector publish failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

//! Webhook posting with bounded retries
//!
//! Posts the post payload as JSON to the configured webhook. Transient
//! failures are retried with exponential backoff plus jitter; everything
//! else fails immediately. No-op when no webhook is configured.

use anyhow::{Result, anyhow, bail};
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backoff cap in milliseconds
const MAX_BACKOFF_MS: u64 = 30_000;

/// Connect timeout for webhook calls
const CONNECT_TIMEOUT_SECS: u64 = 10;

pub struct WebhookPoster {
    client: Client,
    url: Option<String>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl WebhookPoster {
    pub fn new(url: Option<String>, max_retries: u32) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url,
            max_retries,
            backoff_base_ms: 1000,
        }
    }

    #[cfg(test)]
    fn with_backoff_base(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// POST the payload to the webhook, retrying transient failures.
    pub async fn post(&self, payload: &serde_json::Value) -> Result<()> {
        let Some(url) = self.url.as_deref() else {
            debug!("No webhook configured, skipping post");
            return Ok(());
        };

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let base_delay = (1u64 << (attempt - 1)) * self.backoff_base_ms;
                let jitter = rand::thread_rng().gen_range(0..=base_delay / 2);
                let delay = (base_delay + jitter).min(MAX_BACKOFF_MS);
                debug!(
                    "Retrying webhook after {}ms (attempt {}/{})",
                    delay, attempt, self.max_retries
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.client.post(url).json(payload).send().await {
                Ok(response) if response.status().is_success() => {
                    if attempt > 0 {
                        info!("Webhook succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if !is_retryable_status(status) || attempt >= self.max_retries {
                        bail!("Webhook failed: {} {}", status.as_u16(), body);
                    }
                    warn!(
                        "Webhook returned {} (attempt {}/{})",
                        status.as_u16(),
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_error = Some(anyhow!("Webhook failed: {} {}", status.as_u16(), body));
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect();
                    if !transient || attempt >= self.max_retries {
                        return Err(e.into());
                    }
                    warn!(
                        "Webhook request failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_error = Some(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("Webhook retries exhausted")))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, extract::State, http::StatusCode, routing::post};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `statuses[n]` for the n-th request, repeating the last entry.
    async fn spawn_stub(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = (hits.clone(), Arc::new(statuses));
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State((hits, statuses)): State<(Arc<AtomicUsize>, Arc<Vec<u16>>)>| async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst);
                        let code = *statuses.get(n).unwrap_or_else(|| {
                            statuses.last().expect("at least one status")
                        });
                        StatusCode::from_u16(code).unwrap()
                    },
                ),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), hits)
    }

    #[tokio::test]
    async fn test_post_without_url_is_a_noop() {
        let poster = WebhookPoster::new(None, 3);
        poster.post(&serde_json::json!({"source": "x"})).await.unwrap();
    }

    #[tokio::test]
    async fn test_post_retries_transient_statuses() {
        let (url, hits) = spawn_stub(vec![503, 503, 200]).await;
        let poster = WebhookPoster::new(Some(url), 3).with_backoff_base(1);

        poster.post(&serde_json::json!({"source": "x"})).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_post_fails_fast_on_client_error() {
        let (url, hits) = spawn_stub(vec![400]).await;
        let poster = WebhookPoster::new(Some(url), 3).with_backoff_base(1);

        let err = poster.post(&serde_json::json!({"source": "x"})).await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_post_gives_up_after_max_retries() {
        let (url, hits) = spawn_stub(vec![503]).await;
        let poster = WebhookPoster::new(Some(url), 2).with_backoff_base(1);

        let err = poster.post(&serde_json::json!({"source": "x"})).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}

//! HTTP client for OpenAI-compatible chat completion endpoints
//!
//! One blocking-style async exchange per call: build the request, POST it,
//! classify the failure or decode the body. There is no retry at this layer.

use crate::core::provider::{ChatError, ChatProvider};
use crate::core::redact::redact_header;
use crate::models::chat::{ChatCompletionRequest, ChatCompletionResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, trace};

/// Client for a hosted chat completion endpoint
pub struct ChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    name: String,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer credential for the endpoint
    /// * `base_url` - Endpoint base URL, e.g. `https://api.openai.com/v1`
    /// * `timeout` - Request timeout in seconds
    pub fn new(api_key: String, base_url: &str, timeout: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            name: "chat-completions".to_string(),
        }
    }

    /// Classify provider error bodies into actionable messages
    fn classify_error(error_detail: &str) -> String {
        let error_lower = error_detail.to_lowercase();

        if error_lower.contains("invalid_api_key") || error_lower.contains("unauthorized") {
            return "Invalid API key. Please check your credential configuration.".to_string();
        }

        if error_lower.contains("rate_limit") || error_lower.contains("quota") {
            return "Rate limit exceeded. Please wait and try again, or upgrade your API plan."
                .to_string();
        }

        if error_lower.contains("model")
            && (error_lower.contains("not found") || error_lower.contains("does not exist"))
        {
            return "Model not found. Please check your model configuration.".to_string();
        }

        if error_lower.contains("billing") || error_lower.contains("payment") {
            return "Billing issue. Please check your provider account billing status.".to_string();
        }

        error_detail.to_string()
    }
}

#[async_trait]
impl ChatProvider for ChatClient {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("→ POST {}", url);
        trace!(
            "→ Authorization: {}",
            redact_header("Authorization", &self.api_key)
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Unexpected(e.to_string()))?;

        let status = response.status();
        debug!("← {} {}", status.as_u16(), url);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let classified_error = Self::classify_error(&error_text);

            return Err(match status.as_u16() {
                401 => ChatError::Authentication(classified_error),
                429 => ChatError::RateLimit(classified_error),
                400 => ChatError::BadRequest(classified_error),
                _ => ChatError::Api {
                    status: status.as_u16(),
                    message: classified_error,
                },
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Unexpected(format!("Failed to parse response: {}", e)))?;

        Ok(completion)
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}

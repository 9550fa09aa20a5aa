//! Provider abstraction for chat completion backends
//!
//! Services that talk to a hosted inference endpoint depend on this trait so
//! they can be exercised against stub providers in tests.

use crate::models::chat::{ChatCompletionRequest, ChatCompletionResponse};
use async_trait::async_trait;
use thiserror::Error;

/// Error types for chat completion operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Trait for chat completion providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a single non-streaming chat completion request
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ChatError>;

    /// Get the provider name for logging
    fn provider_name(&self) -> &str;
}

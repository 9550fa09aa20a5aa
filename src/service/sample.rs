//! One-shot sample call against the GitHub Models inference endpoint
//!
//! Reads the bearer credential from the environment, sends one fixed chat
//! request, and returns the reply text. The credential check happens before
//! any client is constructed, so a missing token never touches the network.

use crate::core::client::ChatClient;
use crate::core::constants::role;
use crate::core::provider::ChatProvider;
use crate::models::chat::{ChatCompletionRequest, ChatMessage};
use anyhow::{Context, Result};

/// Default hosted inference endpoint
pub const DEFAULT_ENDPOINT: &str = "https://models.github.ai/inference";

/// Model used by the sample request
pub const SAMPLE_MODEL: &str = "openai/gpt-4.1";

/// Endpoint override variable
const ENDPOINT_VAR: &str = "GITHUB_MODELS_ENDPOINT";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const USER_PROMPT: &str = "What is the capital of France?";

/// Request timeout in seconds
const SAMPLE_TIMEOUT: u64 = 30;

/// Resolve the credential: `GITHUB_TOKEN`, falling back to `TOKEN_GITHUB`.
/// Blank values count as unset.
pub fn resolve_token<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup("GITHUB_TOKEN")
        .filter(|token| !token.trim().is_empty())
        .or_else(|| lookup("TOKEN_GITHUB").filter(|token| !token.trim().is_empty()))
}

/// The fixed sample request. Model, messages, and sampling parameters are
/// constants, unaffected by the environment.
pub fn build_request() -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: SAMPLE_MODEL.to_string(),
        messages: vec![
            ChatMessage::new(role::SYSTEM, SYSTEM_PROMPT),
            ChatMessage::new(role::USER, USER_PROMPT),
        ],
        temperature: Some(1.0),
        top_p: Some(1.0),
        max_tokens: None,
    }
}

/// Run the sample call, returning the reply text (empty when the provider
/// returns no choices).
pub async fn run() -> Result<String> {
    let token = resolve_token(|key| std::env::var(key).ok()).context(
        "Missing token. Set GITHUB_TOKEN or TOKEN_GITHUB as an environment variable \
         (e.g., export GITHUB_TOKEN=...)",
    )?;

    let endpoint = std::env::var(ENDPOINT_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    invoke(token, &endpoint).await
}

/// Send the fixed request to `endpoint` and extract the reply text.
pub async fn invoke(token: String, endpoint: &str) -> Result<String> {
    let client = ChatClient::new(token, endpoint, SAMPLE_TIMEOUT);
    let response = client.complete(&build_request()).await?;
    Ok(response.first_text())
}

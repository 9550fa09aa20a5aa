//! HTTP status server endpoints
//!
//! Small axum server exposing the service banner, a health check that
//! reports the scheduled next run, and a provider connectivity test.

use crate::core::config::Config;
use crate::core::constants::role;
use crate::core::provider::ChatProvider;
use crate::models::chat::{ChatCompletionRequest, ChatMessage};
use crate::service::scheduler::load_next_run;
use anyhow::{Context, Result};
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn ChatProvider>,
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/test-connection", get(test_connection))
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(config: Config, provider: Arc<dyn ChatProvider>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        config: Arc::new(config),
        provider,
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// GET / - Service banner
async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "AutoPost Service - LLM Driven Scheduling",
        "status": "running",
        "config": {
            "model": state.config.openai_model,
            "api_key_configured": !state.config.openai_api_key.is_empty(),
            "webhook_configured": state.config.webhook_url.is_some(),
        },
        "endpoints": {
            "health": "/health",
            "test_connection": "/test-connection",
        },
    }))
}

/// GET /health - Health check with the scheduled next run
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut health = json!({
        "status": "healthy",
        "timestamp": chrono::Local::now().to_rfc3339(),
    });

    let object = health.as_object_mut().expect("health is an object");
    match load_next_run(&state.config.next_run_path()) {
        Ok(Some(next_run)) => {
            object.insert("next_run_at".to_string(), json!(next_run.timestamp));
            object.insert("strategy".to_string(), json!(next_run.strategy));
            object.insert("confidence".to_string(), json!(next_run.confidence));
            object.insert("reason".to_string(), json!(next_run.reason));
        }
        Ok(None) => {
            object.insert("next_run_at".to_string(), json!("not scheduled"));
            object.insert("strategy".to_string(), json!("llm"));
        }
        Err(e) => {
            object.insert("error".to_string(), json!(e.to_string()));
        }
    }

    Json(health)
}

/// GET /test-connection - Test provider connectivity with a minimal request
async fn test_connection(State(state): State<AppState>) -> impl IntoResponse {
    let test_request = ChatCompletionRequest {
        model: state.config.openai_model.clone(),
        messages: vec![ChatMessage::new(role::USER, "Hello")],
        temperature: Some(1.0),
        top_p: None,
        max_tokens: Some(5),
    };

    match state.provider.complete(&test_request).await {
        Ok(response) => Json(json!({
            "status": "success",
            "message": format!(
                "Successfully connected to {} API",
                state.provider.provider_name()
            ),
            "model_used": state.config.openai_model,
            "timestamp": chrono::Local::now().to_rfc3339(),
            "response_id": response.id,
        })),
        Err(e) => {
            error!("API connectivity test failed: {}", e);
            Json(json!({
                "status": "failed",
                "error_type": "API Error",
                "message": e.to_string(),
                "timestamp": chrono::Local::now().to_rfc3339(),
                "suggestions": [
                    "Check your API key is valid",
                    "Verify your API key has the necessary permissions",
                    "Check if you have reached rate limits",
                ],
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::ChatError;
    use crate::models::chat::{ChatChoice, ChatCompletionResponse};
    use async_trait::async_trait;

    struct StubProvider;

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn complete(
            &self,
            _request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, ChatError> {
            Ok(ChatCompletionResponse {
                id: "stub-id".to_string(),
                model: "stub".to_string(),
                choices: vec![ChatChoice {
                    index: 0,
                    message: ChatMessage::new(role::ASSISTANT, "Hi"),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            })
        }

        fn provider_name(&self) -> &str {
            "stub"
        }
    }

    async fn spawn_app(state_dir: &std::path::Path) -> String {
        let state_dir = state_dir.to_path_buf();
        let config = Config::from_lookup(move |key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "STATE_DIR" => Some(state_dir.to_string_lossy().to_string()),
            _ => None,
        })
        .unwrap();

        let state = AppState {
            config: Arc::new(config),
            provider: Arc::new(StubProvider),
        };
        let app = create_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health_without_plan_reports_not_scheduled() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path()).await;

        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["next_run_at"], "not scheduled");
    }

    #[tokio::test]
    async fn test_health_reports_planned_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("next_run.json"),
            r#"{"timestamp": "2025-03-14T18:41:00+00:00", "reason": "evening peak", "confidence": 0.9, "strategy": "llm", "planned_at": "2025-03-14T00:05:00+00:00"}"#,
        )
        .unwrap();
        let base = spawn_app(dir.path()).await;

        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["next_run_at"], "2025-03-14T18:41:00+00:00");
        assert_eq!(body["strategy"], "llm");
        assert_eq!(body["reason"], "evening peak");
    }

    #[tokio::test]
    async fn test_test_connection_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path()).await;

        let body: serde_json::Value = reqwest::get(format!("{}/test-connection", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["response_id"], "stub-id");
    }

    #[tokio::test]
    async fn test_root_banner() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path()).await;

        let body: serde_json::Value = reqwest::get(&base).await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "running");
        assert_eq!(body["config"]["api_key_configured"], true);
    }
}

//! Caption generation over the chat completion provider
//!
//! Asks the model for strict JSON `{caption, hashtags}` and tolerates prose
//! around the JSON object.

use crate::core::constants::role;
use crate::core::provider::ChatProvider;
use crate::models::chat::{ChatCompletionRequest, ChatMessage};
use crate::service::prompt::PromptTemplates;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::warn;

/// System instruction for caption requests
const CAPTION_SYSTEM: &str = "You write short, algorithm-friendly social captions. Non-explicit, \
confident. Output strict JSON: {caption, hashtags} where hashtags is an array.";

/// Sampling temperature for caption requests
const CAPTION_TEMPERATURE: f32 = 0.7;

/// Hashtag count appended by `join_caption`
const JOIN_HASHTAG_CAP: usize = 3;

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("invalid json block pattern"));

/// A generated caption with its hashtags
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub caption: String,
    pub hashtags: Vec<String>,
}

/// Generates captions for inbox files
pub struct CaptionService {
    provider: Arc<dyn ChatProvider>,
    model: String,
    templates: PromptTemplates,
    max_hashtags: usize,
}

impl CaptionService {
    pub fn new(provider: Arc<dyn ChatProvider>, model: String, max_hashtags: u32) -> Self {
        Self {
            provider,
            model,
            templates: PromptTemplates::new(max_hashtags),
            max_hashtags: max_hashtags as usize,
        }
    }

    /// Generate a caption for a file title and optional collaborator context.
    pub async fn generate(&self, title: &str, collaborator: Option<&str>) -> Result<Caption> {
        let user_prompt = self.templates.caption_prompt(title, collaborator, None);
        if !self.templates.is_prompt_safe(&user_prompt) {
            warn!(
                "Rendered prompt {} is missing its safety rails",
                PromptTemplates::template_id("caption_template.md")
            );
        }

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::new(role::SYSTEM, CAPTION_SYSTEM),
                ChatMessage::new(role::USER, user_prompt),
            ],
            temperature: Some(CAPTION_TEMPERATURE),
            top_p: None,
            max_tokens: None,
        };

        let response = self
            .provider
            .complete(&request)
            .await
            .context("Caption request failed")?;

        parse_caption(&response.first_text(), self.max_hashtags)
    }
}

/// Parse a model reply into a caption, extracting the first JSON object when
/// the reply wraps it in prose.
pub fn parse_caption(text: &str, max_hashtags: usize) -> Result<Caption> {
    #[derive(Deserialize)]
    struct Raw {
        caption: String,
        #[serde(default)]
        hashtags: Vec<String>,
    }

    let json = JSON_BLOCK
        .find(text)
        .map(|m| m.as_str())
        .unwrap_or(text);

    let raw: Raw = serde_json::from_str(json).context("Caption reply was not valid JSON")?;

    let hashtags = raw
        .hashtags
        .iter()
        .map(|tag| tag.replace('#', "").trim().to_string())
        .filter(|tag| !tag.is_empty())
        .take(max_hashtags)
        .collect();

    Ok(Caption {
        caption: raw.caption,
        hashtags,
    })
}

/// Join a caption, a collaborator handle, and a hashtag line into post text.
pub fn join_caption(caption: &str, hashtags: &[String], handle: Option<&str>) -> String {
    let mut text = caption.trim().to_string();
    if let Some(handle) = handle {
        if !handle.trim().is_empty() {
            text = format!("{} {}", text, handle).trim().to_string();
        }
    }
    if !hashtags.is_empty() {
        let tags: Vec<String> = hashtags
            .iter()
            .take(JOIN_HASHTAG_CAP)
            .map(|tag| tag.replace('#', "").trim().to_string())
            .filter(|tag| !tag.is_empty())
            .map(|tag| format!("#{}", tag))
            .collect();
        if !tags.is_empty() {
            text = format!("{}\n{}", text, tags.join(" ")).trim().to_string();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::{ChatError, ChatProvider};
    use crate::models::chat::{ChatChoice, ChatCompletionResponse};
    use async_trait::async_trait;

    struct StubProvider {
        reply: String,
    }

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn complete(
            &self,
            _request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, ChatError> {
            Ok(ChatCompletionResponse {
                id: "stub".to_string(),
                model: "stub".to_string(),
                choices: vec![ChatChoice {
                    index: 0,
                    message: ChatMessage::new(role::ASSISTANT, self.reply.clone()),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            })
        }

        fn provider_name(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn test_generate_parses_json_wrapped_in_prose() {
        let provider = Arc::new(StubProvider {
            reply: "Here you go:\n{\"caption\": \"New drop 🔥\", \"hashtags\": [\"#teaser\", \"new\"]}"
                .to_string(),
        });
        let service = CaptionService::new(provider, "gpt-4o-mini".to_string(), 3);
        let caption = service.generate("ivy_teaser.mp4", Some("@ivy")).await.unwrap();
        assert_eq!(caption.caption, "New drop 🔥");
        assert_eq!(caption.hashtags, vec!["teaser", "new"]);
    }

    #[tokio::test]
    async fn test_generate_rejects_non_json_reply() {
        let provider = Arc::new(StubProvider {
            reply: "sorry, I cannot help with that".to_string(),
        });
        let service = CaptionService::new(provider, "gpt-4o-mini".to_string(), 3);
        assert!(service.generate("clip.mp4", None).await.is_err());
    }

    #[test]
    fn test_parse_caption_caps_hashtags() {
        let caption = parse_caption(
            r#"{"caption": "Go", "hashtags": ["a", "b", "c", "d", "e"]}"#,
            3,
        )
        .unwrap();
        assert_eq!(caption.hashtags, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_caption_strips_hash_prefixes_and_blanks() {
        let caption = parse_caption(
            r##"{"caption": "Go", "hashtags": ["#one", "  ", "#two "]}"##,
            3,
        )
        .unwrap();
        assert_eq!(caption.hashtags, vec!["one", "two"]);
    }

    #[test]
    fn test_parse_caption_without_hashtags() {
        let caption = parse_caption(r#"{"caption": "Just this"}"#, 3).unwrap();
        assert_eq!(caption.caption, "Just this");
        assert!(caption.hashtags.is_empty());
    }

    #[test]
    fn test_join_caption_full() {
        let text = join_caption(
            " New drop ",
            &["one".to_string(), "two".to_string()],
            Some("@ivy"),
        );
        assert_eq!(text, "New drop @ivy\n#one #two");
    }

    #[test]
    fn test_join_caption_caps_at_three_tags() {
        let tags: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let text = join_caption("Go", &tags, None);
        assert_eq!(text, "Go\n#a #b #c");
    }

    #[test]
    fn test_join_caption_without_handle_or_tags() {
        assert_eq!(join_caption("  Solo caption  ", &[], None), "Solo caption");
    }
}

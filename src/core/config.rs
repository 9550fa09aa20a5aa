//! Application configuration management
//!
//! Configuration is environment-driven and validated at startup so the
//! process fails fast when misconfigured. `.env` files are honored by the
//! binary entry point before this module reads the environment.

use anyhow::{Result, bail};
use std::path::PathBuf;
use tracing::warn;

/// Default model for caption and scheduling requests
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible endpoint
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT: u64 = 90;

/// Default maximum retries for webhook posting
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default hashtag cap for generated captions
const DEFAULT_MAX_HASHTAGS: u32 = 3;

/// Default server port
const DEFAULT_PORT: u16 = 8080;

/// Application configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the chat completion endpoint (required)
    pub openai_api_key: String,

    /// Model for caption and scheduling requests
    pub openai_model: String,

    /// Chat completion endpoint base URL
    pub openai_base_url: String,

    /// Maximum hashtags per generated caption (clamped to 1..=10)
    pub max_hashtags: u32,

    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Maximum retries for webhook posting
    pub max_retries: u32,

    /// Directory for scheduler and history state files
    pub state_dir: PathBuf,

    /// Directory scanned for files awaiting posting
    pub inbox_dir: PathBuf,

    /// Directory posted files are archived into
    pub archive_dir: PathBuf,

    /// Webhook endpoint for posting; `None` disables posting
    pub webhook_url: Option<String>,

    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Logging level
    pub log_level: String,

    /// Bypass the best-slot gate
    pub force_post: bool,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error naming every missing required variable at once.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an environment lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut missing = Vec::new();
        let openai_api_key = get("OPENAI_API_KEY").unwrap_or_else(|| {
            missing.push("OPENAI_API_KEY");
            String::new()
        });

        if !missing.is_empty() {
            bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let max_hashtags =
            parse_or_default(get("MAX_HASHTAGS"), "MAX_HASHTAGS", DEFAULT_MAX_HASHTAGS)
                .clamp(1, 10);

        Ok(Config {
            openai_api_key,
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_hashtags,
            request_timeout: parse_or_default(
                get("REQUEST_TIMEOUT"),
                "REQUEST_TIMEOUT",
                DEFAULT_REQUEST_TIMEOUT,
            ),
            max_retries: parse_or_default(get("MAX_RETRIES"), "MAX_RETRIES", DEFAULT_MAX_RETRIES),
            state_dir: PathBuf::from(get("STATE_DIR").unwrap_or_else(|| "./state".to_string())),
            inbox_dir: PathBuf::from(get("INBOX_DIR").unwrap_or_else(|| "./inbox".to_string())),
            archive_dir: PathBuf::from(
                get("ARCHIVE_DIR").unwrap_or_else(|| "./archive".to_string()),
            ),
            webhook_url: get("WEBHOOK_URL"),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or_default(get("PORT"), "PORT", DEFAULT_PORT),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            force_post: get("FORCE_POST")
                .map(|value| value.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    /// Path of the scheduler's planned-run state file
    pub fn next_run_path(&self) -> PathBuf {
        self.state_dir.join("next_run.json")
    }

    /// Path of the posting history state file
    pub fn history_path(&self) -> PathBuf {
        self.state_dir.join("post_history.json")
    }

    /// Path of the best-slots gating file
    pub fn best_slots_path(&self) -> PathBuf {
        self.state_dir.join("best_slots.json")
    }

    /// Path of the collaborator handle mapping
    pub fn collabs_path(&self) -> PathBuf {
        self.state_dir.join("collabs.json")
    }
}

fn parse_or_default<T>(value: Option<String>, name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {} value: {}, using default: {}", name, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.max_hashtags, 3);
        assert_eq!(config.request_timeout, 90);
        assert_eq!(config.port, 8080);
        assert!(config.webhook_url.is_none());
        assert!(!config.force_post);
    }

    #[test]
    fn test_missing_api_key_named_in_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_blank_api_key_treated_as_missing() {
        let err = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "   ")])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_max_hashtags_clamped() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MAX_HASHTAGS", "25"),
        ]))
        .unwrap();
        assert_eq!(config.max_hashtags, 10);
    }

    #[test]
    fn test_invalid_numeric_falls_back_to_default() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("REQUEST_TIMEOUT", "soon"),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout, 90);
    }

    #[test]
    fn test_overrides_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("WEBHOOK_URL", "https://hooks.example.com/post"),
            ("STATE_DIR", "/var/lib/autopost"),
            ("FORCE_POST", "TRUE"),
        ]))
        .unwrap();
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://hooks.example.com/post")
        );
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/autopost"));
        assert!(config.force_post);
    }
}

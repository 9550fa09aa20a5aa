//! AutoPost - LLM-driven caption generation, scheduling, and posting
//!
//! Single binary with command dispatch: the default mode runs the posting
//! workflow; subcommands cover the hosted-inference sample call, daily
//! planning, engagement analysis, the status server, and configuration
//! checks.

mod api;
mod core;
mod models;
mod service;
mod util;

use crate::core::client::ChatClient;
use crate::core::config::Config;
use crate::core::logging::init_logging;
use crate::core::provider::ChatProvider;
use crate::core::redact::redact_error;
use crate::service::runner::Runner;
use crate::service::scheduler::Scheduler;
use std::sync::Arc;
use tracing::warn;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_logging(&log_level);

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|arg| arg.to_lowercase());

    let code = match command.as_deref() {
        Some("sample") => run_sample().await,
        Some("plan") => run_plan().await,
        Some("analyze") => run_analyze(),
        Some("server") => run_server().await,
        Some("check") => {
            service::check::run();
            0
        }
        Some("help") | Some("--help") | Some("-h") => {
            print_help();
            0
        }
        Some(other) => {
            warn!("Unknown command: {}", other);
            print_help();
            1
        }
        None => run_post().await,
    };

    std::process::exit(code);
}

/// Load configuration or report the failure the way every command does.
fn load_config() -> Option<Config> {
    match Config::from_env() {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Configuration Error: {}", e);
            None
        }
    }
}

fn chat_provider(config: &Config) -> Arc<dyn ChatProvider> {
    Arc::new(ChatClient::new(
        config.openai_api_key.clone(),
        &config.openai_base_url,
        config.request_timeout,
    ))
}

async fn run_post() -> i32 {
    let Some(config) = load_config() else {
        return 1;
    };
    let provider = chat_provider(&config);
    match Runner::new(config).run(provider).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Posting failed: {}", redact_error(&e));
            eprintln!("Run with 'check' command to verify dependencies");
            1
        }
    }
}

async fn run_sample() -> i32 {
    match service::sample::run().await {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Sample encountered an error: {}", redact_error(&e));
            1
        }
    }
}

async fn run_plan() -> i32 {
    let Some(config) = load_config() else {
        return 1;
    };
    let provider = chat_provider(&config);
    let scheduler = Scheduler::new(
        Some(provider),
        config.openai_model.clone(),
        config.state_dir.clone(),
        config.max_hashtags,
    );
    match scheduler.plan_daily_post().await {
        Ok(next_run) => {
            println!("Post scheduled for: {}", next_run.timestamp);
            0
        }
        Err(e) => {
            eprintln!("Planning failed: {}", redact_error(&e));
            1
        }
    }
}

fn run_analyze() -> i32 {
    let Some(config) = load_config() else {
        return 1;
    };
    match service::analyzer::run(&config) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Analysis failed: {}", redact_error(&e));
            1
        }
    }
}

async fn run_server() -> i32 {
    let Some(config) = load_config() else {
        return 1;
    };
    let provider = chat_provider(&config);
    match api::endpoints::serve(config, provider).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Server error: {}", redact_error(&e));
            1
        }
    }
}

/// Print help message
fn print_help() {
    println!("AutoPost - LLM-driven caption generation and posting");
    println!();
    println!("Usage: autopost [command]");
    println!();
    println!("Commands:");
    println!("  (none)    Run the posting workflow (requires credentials)");
    println!("  sample    Send one sample request to the hosted inference endpoint");
    println!("  plan      Plan today's posting time with the LLM scheduler");
    println!("  analyze   Compute best posting slots from engagement history");
    println!("  server    Run the HTTP status server");
    println!("  check     Check configuration and system dependencies");
    println!("  help      Show this help message");
    println!();
    println!("Environment variables:");
    println!("  OPENAI_API_KEY          API key for caption/scheduling requests (required)");
    println!("  OPENAI_MODEL            Model name (default: gpt-4o-mini)");
    println!("  OPENAI_BASE_URL         Chat endpoint base URL (default: https://api.openai.com/v1)");
    println!("  GITHUB_TOKEN            Credential for the 'sample' command (or TOKEN_GITHUB)");
    println!("  GITHUB_MODELS_ENDPOINT  Endpoint override for the 'sample' command");
    println!("  WEBHOOK_URL             Posting webhook (optional; posting skipped when unset)");
    println!("  STATE_DIR               State directory (default: ./state)");
    println!("  INBOX_DIR               Inbox directory (default: ./inbox)");
    println!("  ARCHIVE_DIR             Archive directory (default: ./archive)");
    println!("  MAX_HASHTAGS            Hashtag cap for captions (default: 3)");
    println!("  FORCE_POST              Bypass the posting-slot gate (true/false)");
    println!("  HOST / PORT             Status server bind address (default: 0.0.0.0:8080)");
    println!("  LOG_LEVEL               Logging level (default: info)");
}

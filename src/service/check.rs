//! Configuration and dependency checks
//!
//! `autopost check` reports system information, which credentials are set
//! (names only, never values), and whether the working directories are
//! usable. It never fails the process.

use crate::core::config::Config;
use std::path::Path;
use tracing::{info, warn};

/// Credential variables reported by the check
const CREDENTIAL_VARS: [&str; 4] = [
    "OPENAI_API_KEY",
    "WEBHOOK_URL",
    "GITHUB_TOKEN",
    "TOKEN_GITHUB",
];

pub fn run() {
    info!("System Information:");
    info!("OS: {} {}", std::env::consts::OS, std::env::consts::ARCH);
    match std::env::current_dir() {
        Ok(dir) => info!("Working Directory: {}", dir.display()),
        Err(e) => warn!("Working directory unavailable: {}", e),
    }

    info!("Credential Check:");
    for var in CREDENTIAL_VARS {
        let present = std::env::var(var)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false);
        info!("{}: {}", var, if present { "set" } else { "missing" });
    }

    info!("Configuration Check:");
    match Config::from_env() {
        Ok(config) => {
            info!("Configuration loaded");
            info!("Model: {}", config.openai_model);
            info!("State dir writable: {}", dir_writable(&config.state_dir));
            info!("Inbox dir present: {}", config.inbox_dir.is_dir());
            info!("Archive dir present: {}", config.archive_dir.is_dir());
            if let Some(url) = &config.webhook_url {
                if crate::core::redact::contains_sensitive_info(url) {
                    warn!("WEBHOOK_URL appears to embed a credential");
                }
            }
        }
        Err(e) => warn!("Configuration invalid: {}", e),
    }
}

/// Whether the directory exists (or can be created) and accepts writes.
fn dir_writable(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".write_probe");
    match std::fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

//! The default posting workflow
//!
//! Gate by the best posting slot, pick the oldest inbox file, generate a
//! caption, post it through the webhook, archive the file, and record the
//! post in the history.

use crate::core::config::Config;
use crate::core::provider::ChatProvider;
use crate::core::redact::redact_error;
use crate::service::analyzer::should_post_now;
use crate::service::caption::{CaptionService, join_caption};
use crate::service::poster::WebhookPoster;
use crate::service::scheduler::{PostRecord, append_history};
use crate::util::collab::{load_collab_handle, parse_collab_from_filename};
use crate::util::filename::build_name;
use anyhow::{Context, Result};
use chrono::Local;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct Runner {
    config: Config,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self, provider: Arc<dyn ChatProvider>) -> Result<()> {
        let now = Local::now();

        if !should_post_now(&self.config.best_slots_path(), now, self.config.force_post) {
            println!("Not in best posting slot now. Skipping.");
            return Ok(());
        }

        let Some(source) = oldest_inbox_file(&self.config.inbox_dir)? else {
            println!("No files found in inbox. Nothing to do.");
            return Ok(());
        };
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        println!("Picked inbox file: {}", file_name);

        let collab = parse_collab_from_filename(&file_name);
        let handle = collab
            .as_deref()
            .and_then(|collab| load_collab_handle(&self.config.collabs_path(), collab));

        let captions = CaptionService::new(
            provider,
            self.config.openai_model.clone(),
            self.config.max_hashtags,
        );
        let context = handle.as_deref().or(collab.as_deref());
        let caption = captions.generate(&file_name, context).await?;
        let text = join_caption(&caption.caption, &caption.hashtags, handle.as_deref());
        info!("Generated caption with {} hashtags", caption.hashtags.len());

        let poster = WebhookPoster::new(self.config.webhook_url.clone(), self.config.max_retries);
        let payload = json!({
            "source": file_name,
            "caption": text,
            "posted_at": now.to_rfc3339(),
        });
        match poster.post(&payload).await {
            Ok(()) => {
                if self.config.webhook_url.is_some() {
                    println!("Posted: {}", file_name);
                } else {
                    println!("Webhook missing; skipping posting.");
                }
            }
            // The file is still archived so the next run does not repost it.
            Err(e) => eprintln!("Post failed: {}", redact_error(&e)),
        }

        let archived = archive_file(&source, &self.config.archive_dir, collab.as_deref())?;
        println!("Archived to {}", archived.display());

        append_history(&self.config.history_path(), PostRecord::posted_at(now))?;
        Ok(())
    }
}

/// The oldest regular file in the inbox, by modification time then name.
/// A missing inbox directory counts as empty.
fn oldest_inbox_file(inbox_dir: &Path) -> Result<Option<PathBuf>> {
    let entries = match std::fs::read_dir(inbox_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", inbox_dir.display()));
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            let modified = entry.metadata()?.modified()?;
            files.push((modified, path));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(files.into_iter().next().map(|(_, path)| path))
}

/// Move a file into the archive under a dated, sanitized name. Indexes bump
/// until the name is free.
fn archive_file(source: &Path, archive_dir: &Path, collab: Option<&str>) -> Result<PathBuf> {
    std::fs::create_dir_all(archive_dir)
        .with_context(|| format!("Failed to create {}", archive_dir.display()))?;

    let date = Local::now().date_naive();
    let mut index = 1;
    let mut dest = archive_dir.join(build_name(date, collab, "post", index));
    while dest.exists() {
        index += 1;
        dest = archive_dir.join(build_name(date, collab, "post", index));
    }

    std::fs::rename(source, &dest).or_else(|_| {
        // Fall back to copy + remove across filesystems.
        std::fs::copy(source, &dest).and_then(|_| std::fs::remove_file(source))
    })
    .with_context(|| format!("Failed to archive {}", source.display()))?;

    Ok(dest)
}

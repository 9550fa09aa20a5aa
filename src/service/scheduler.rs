//! LLM-driven planning of the daily posting time
//!
//! Once per day the scheduler asks the model for an optimal posting time
//! based on recent engagement history, validates the suggestion against the
//! posting window and recently used minutes, and persists the plan under the
//! state directory. Without a provider (or when the model call fails) a
//! random in-window time is used instead.

use crate::core::constants::role;
use crate::core::provider::ChatProvider;
use crate::models::chat::{ChatCompletionRequest, ChatMessage};
use crate::service::prompt::PromptTemplates;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, Timelike};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

/// System instruction for scheduling requests
const SCHEDULING_SYSTEM: &str = "You are a social media optimization expert. Analyze posting \
history and suggest optimal posting times.";

/// History lines included in the scheduling prompt
const HISTORY_PROMPT_LIMIT: usize = 30;

/// Days of history whose minutes are avoided
const AVOID_WINDOW_DAYS: i64 = 14;

/// Earliest allowed posting time
const WINDOW_START: (u32, u32) = (7, 0);

/// Latest allowed posting time
const WINDOW_END: (u32, u32) = (23, 30);

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("invalid json block pattern"));

/// One posted item with its engagement numbers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub datetime: String,
    pub weekday: String,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub reposts: u64,
    #[serde(default)]
    pub watch_time_ratio: f64,
    #[serde(default)]
    pub video_length_sec: u32,
}

impl PostRecord {
    /// A fresh record for a post made now; engagement numbers start at zero
    /// and are filled in later by whatever exports platform analytics.
    pub fn posted_at(now: DateTime<Local>) -> Self {
        Self {
            datetime: now.to_rfc3339(),
            weekday: now.format("%a").to_string(),
            impressions: 0,
            likes: 0,
            comments: 0,
            reposts: 0,
            watch_time_ratio: 0.0,
            video_length_sec: 0,
        }
    }
}

/// The persisted plan for today's post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextRun {
    pub timestamp: String,
    pub reason: String,
    pub confidence: f64,
    pub strategy: String,
    pub planned_at: String,
}

/// A validated posting-time suggestion
#[derive(Debug, Clone)]
struct PostTime {
    time: NaiveTime,
    reason: String,
    confidence: f64,
    strategy: &'static str,
}

/// Plans the daily posting time
pub struct Scheduler {
    provider: Option<Arc<dyn ChatProvider>>,
    model: String,
    state_dir: PathBuf,
    templates: PromptTemplates,
}

impl Scheduler {
    pub fn new(
        provider: Option<Arc<dyn ChatProvider>>,
        model: String,
        state_dir: PathBuf,
        max_hashtags: u32,
    ) -> Self {
        Self {
            provider,
            model,
            state_dir,
            templates: PromptTemplates::new(max_hashtags),
        }
    }

    fn next_run_path(&self) -> PathBuf {
        self.state_dir.join("next_run.json")
    }

    fn history_path(&self) -> PathBuf {
        self.state_dir.join("post_history.json")
    }

    /// Plan today's posting time. Idempotent for the day: an existing plan
    /// for today is returned unchanged.
    pub async fn plan_daily_post(&self) -> Result<NextRun> {
        std::fs::create_dir_all(&self.state_dir).with_context(|| {
            format!("Failed to create state directory {}", self.state_dir.display())
        })?;

        let now = Local::now();
        if let Some(existing) = planned_run_for(&self.next_run_path(), now.date_naive())? {
            info!("Already have a planned time for today, skipping.");
            return Ok(existing);
        }

        let history = load_history(&self.history_path())?;
        let avoid_minutes = recent_minutes(&history, AVOID_WINDOW_DAYS, now);

        let post_time = match &self.provider {
            Some(provider) => match self.ask_llm(provider.as_ref(), &history, &avoid_minutes).await
            {
                Ok(post_time) => post_time,
                Err(e) => {
                    warn!("Scheduling request failed: {}. Using fallback time.", e);
                    fallback_time(&avoid_minutes)
                }
            },
            None => {
                info!("No provider configured, using fallback scheduling.");
                fallback_time(&avoid_minutes)
            }
        };

        let next_run = self.save_next_run(now, &post_time)?;
        info!("Saved next run time: {}", next_run.timestamp);
        Ok(next_run)
    }

    async fn ask_llm(
        &self,
        provider: &dyn ChatProvider,
        history: &[PostRecord],
        avoid_minutes: &HashSet<String>,
    ) -> Result<PostTime> {
        let history_data = format_history(history);
        let mut avoid: Vec<&str> = avoid_minutes.iter().map(String::as_str).collect();
        avoid.sort_unstable();

        let day_type = if matches!(Local::now().weekday().num_days_from_monday(), 5 | 6) {
            "weekend"
        } else {
            "weekday"
        };

        let prompt = self.templates.scheduling_prompt(
            &history_data,
            None,
            &avoid.join(", "),
            day_type,
            "video teaser",
        );
        info!(
            "Requesting posting time with template {}",
            PromptTemplates::template_id("scheduling_template.md")
        );

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::new(role::SYSTEM, SCHEDULING_SYSTEM),
                ChatMessage::new(role::USER, prompt),
            ],
            temperature: Some(0.7),
            top_p: None,
            max_tokens: Some(200),
        };

        let response = provider.complete(&request).await?;
        parse_suggestion(&response.first_text(), avoid_minutes)
    }

    fn save_next_run(&self, now: DateTime<Local>, post_time: &PostTime) -> Result<NextRun> {
        let timestamp = now
            .date_naive()
            .and_time(post_time.time)
            .and_local_timezone(Local)
            .earliest()
            .ok_or_else(|| anyhow!("Planned time does not exist in the local timezone"))?;

        let next_run = NextRun {
            timestamp: timestamp.to_rfc3339(),
            reason: post_time.reason.clone(),
            confidence: post_time.confidence,
            strategy: post_time.strategy.to_string(),
            planned_at: now.to_rfc3339(),
        };

        let content = serde_json::to_string_pretty(&next_run)?;
        std::fs::write(self.next_run_path(), content).with_context(|| {
            format!("Failed to write {}", self.next_run_path().display())
        })?;
        Ok(next_run)
    }
}

/// Format recent history into prompt lines, newest-first input assumed.
fn format_history(history: &[PostRecord]) -> String {
    history
        .iter()
        .take(HISTORY_PROMPT_LIMIT)
        .map(|post| {
            format!(
                "- {} ({}): {} impressions, {} likes, {:.2} watch ratio",
                post.datetime, post.weekday, post.impressions, post.likes, post.watch_time_ratio
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the model's `{"time", "reason", "confidence"}` reply and adjust the
/// time away from round and recently used minutes.
fn parse_suggestion(text: &str, avoid_minutes: &HashSet<String>) -> Result<PostTime> {
    #[derive(Deserialize)]
    struct Raw {
        time: String,
        #[serde(default)]
        reason: String,
        #[serde(default = "default_confidence")]
        confidence: f64,
    }

    fn default_confidence() -> f64 {
        0.5
    }

    let json = JSON_BLOCK.find(text).map(|m| m.as_str()).unwrap_or(text);
    let raw: Raw = serde_json::from_str(json).context("Scheduling reply was not valid JSON")?;

    let mut time = NaiveTime::parse_from_str(raw.time.trim(), "%H:%M")
        .with_context(|| format!("Invalid suggested time: {}", raw.time))?;

    let minute_key = format!("{:02}", time.minute());
    if avoid_minutes.contains(&minute_key) || time.minute() == 0 || time.minute() == 30 {
        time = adjust_time(time, avoid_minutes);
    }

    Ok(PostTime {
        time,
        reason: raw.reason,
        confidence: raw.confidence,
        strategy: "llm",
    })
}

/// Shift a time by a few minutes to escape round or recently used minutes
/// while staying inside the posting window.
fn adjust_time(time: NaiveTime, avoid_minutes: &HashSet<String>) -> NaiveTime {
    let window_start = NaiveTime::from_hms_opt(WINDOW_START.0, WINDOW_START.1, 0)
        .expect("valid window start");
    let window_end =
        NaiveTime::from_hms_opt(WINDOW_END.0, WINDOW_END.1, 0).expect("valid window end");

    for offset in 1..=29i64 {
        for sign in [1i64, -1] {
            let adjusted = time + chrono::Duration::minutes(offset * sign);
            let minute_key = format!("{:02}", adjusted.minute());

            if !avoid_minutes.contains(&minute_key)
                && adjusted.minute() != 0
                && adjusted.minute() != 30
                && adjusted > window_start
                && adjusted < window_end
            {
                return adjusted;
            }
        }
    }
    time
}

/// A random in-window time on a non-round, non-avoided minute.
fn fallback_time(avoid_minutes: &HashSet<String>) -> PostTime {
    let mut rng = rand::thread_rng();

    let hour = rng.gen_range(7..24u32);
    let mut minute;
    loop {
        minute = rng.gen_range(1..60u32);
        if minute != 0 && minute != 30 && !avoid_minutes.contains(&format!("{:02}", minute)) {
            break;
        }
    }
    if hour == 23 && minute > 30 {
        minute = rng.gen_range(1..30u32);
    }

    PostTime {
        time: NaiveTime::from_hms_opt(hour, minute, 0).expect("valid fallback time"),
        reason: "Fallback random time (LLM unavailable)".to_string(),
        confidence: 0.5,
        strategy: "fallback",
    }
}

/// Minutes used by posts within the last `days` days, as zero-padded strings.
fn recent_minutes(history: &[PostRecord], days: i64, now: DateTime<Local>) -> HashSet<String> {
    let cutoff = now - chrono::Duration::days(days);
    history
        .iter()
        .filter_map(|post| DateTime::parse_from_rfc3339(&post.datetime).ok())
        .filter(|datetime| *datetime > cutoff)
        .map(|datetime| format!("{:02}", datetime.minute()))
        .collect()
}

/// The existing plan when it targets `today`, else `None`.
fn planned_run_for(path: &Path, today: NaiveDate) -> Result<Option<NextRun>> {
    let Some(next_run) = load_next_run(path)? else {
        return Ok(None);
    };
    let scheduled = DateTime::parse_from_rfc3339(&next_run.timestamp)
        .with_context(|| format!("Invalid timestamp in {}", path.display()))?;
    if scheduled.with_timezone(&Local).date_naive() == today {
        Ok(Some(next_run))
    } else {
        Ok(None)
    }
}

/// Load the persisted plan, if any.
pub fn load_next_run(path: &Path) -> Result<Option<NextRun>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let next_run = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(next_run))
}

/// Load the posting history; a missing file is an empty history.
pub fn load_history(path: &Path) -> Result<Vec<PostRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let history = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(history)
}

/// Append a record to the posting history file.
pub fn append_history(path: &Path, record: PostRecord) -> Result<()> {
    let mut history = load_history(path)?;
    history.push(record);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(&history)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

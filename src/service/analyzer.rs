//! Engagement analysis and posting-slot gating
//!
//! Buckets the posting history by weekday and hour, scores each hour with
//! Laplace smoothing, and writes the best slot per weekday to
//! `best_slots.json` plus a human-readable `analysis.md`. The posting
//! workflow gates on those slots.

use crate::core::config::Config;
use crate::service::scheduler::{PostRecord, load_history};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Best posting hour for one weekday
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub day: String,
    pub hour: u32,
    pub score: f64,
    pub samples: u32,
}

/// The persisted slot analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestSlots {
    pub timezone: String,
    pub updated_at: String,
    pub slots: Vec<Slot>,
}

/// Compute the engagement-maximal hour per weekday.
///
/// Each (weekday, hour) cell accumulates post count and engagement
/// (likes + reposts); the hour score is `(engagement + 1) / (count + 1)`.
pub fn best_slots(history: &[PostRecord]) -> Vec<Slot> {
    let mut counts = [[0u32; 24]; 7];
    let mut engagement = [[0f64; 24]; 7];

    for post in history {
        let Ok(datetime) = DateTime::parse_from_rfc3339(&post.datetime) else {
            warn!("Skipping history record with invalid datetime: {}", post.datetime);
            continue;
        };
        let local = datetime.with_timezone(&Local);
        let day = local.weekday().num_days_from_monday() as usize;
        let hour = local.hour() as usize;
        counts[day][hour] += 1;
        engagement[day][hour] += (post.likes + post.reposts) as f64;
    }

    let mut slots = Vec::with_capacity(7);
    for day in 0..7 {
        let mut best_score = -1.0;
        let mut best_hour = 9;
        for hour in 0..24 {
            let score = (engagement[day][hour] + 1.0) / (f64::from(counts[day][hour]) + 1.0);
            if score > best_score {
                best_score = score;
                best_hour = hour;
            }
        }
        slots.push(Slot {
            day: DAYS[day].to_string(),
            hour: best_hour as u32,
            score: (best_score * 1000.0).round() / 1000.0,
            samples: counts[day][best_hour],
        });
    }
    slots
}

/// Run the analysis over the posting history and write both reports.
pub fn run(config: &Config) -> Result<()> {
    let history = load_history(&config.history_path())?;
    info!("Analyzing {} history records", history.len());

    let slots = best_slots(&history);
    std::fs::create_dir_all(&config.state_dir)?;

    let best = BestSlots {
        timezone: "local".to_string(),
        updated_at: Utc::now().to_rfc3339(),
        slots,
    };
    let json = serde_json::to_string_pretty(&best)?;
    std::fs::write(config.best_slots_path(), json).with_context(|| {
        format!("Failed to write {}", config.best_slots_path().display())
    })?;

    let mut report = String::from("# Best posting times\n\n");
    for slot in &best.slots {
        report.push_str(&format!("{} {:02}:00\n", slot.day, slot.hour));
    }
    let report_path = config.state_dir.join("analysis.md");
    std::fs::write(&report_path, report)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    info!("Wrote {} and {}", config.best_slots_path().display(), report_path.display());
    Ok(())
}

/// Whether the current hour is a best posting slot.
///
/// `force` always passes, as does missing or malformed slot data. When
/// today's weekday has a slot, the current hour must match it.
pub fn should_post_now(best_slots_path: &Path, now: DateTime<Local>, force: bool) -> bool {
    if force {
        return true;
    }

    let Ok(content) = std::fs::read_to_string(best_slots_path) else {
        return true;
    };
    let Ok(best) = serde_json::from_str::<BestSlots>(&content) else {
        warn!("Gating read failed: malformed {}", best_slots_path.display());
        return true;
    };

    let today = now.format("%a").to_string();
    for slot in &best.slots {
        if slot.day == today {
            return slot.hour == now.hour();
        }
    }
    true
}

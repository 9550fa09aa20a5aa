//! Prompt templates with parameter substitution and safety rails
//!
//! Templates are versioned and compiled into the binary. Only template ids
//! are ever logged, never rendered prompt bodies.

/// Caption generation template
const CAPTION_TEMPLATE: &str = include_str!("../../prompts/caption_template.md");

/// Scheduling optimization template
const SCHEDULING_TEMPLATE: &str = include_str!("../../prompts/scheduling_template.md");

/// Default caption tone
const DEFAULT_TONE: &str = "bold, confident, high-energy, non-cringe";

/// Default scheduling window
const DEFAULT_TIME_WINDOW: &str = "07:00-23:30 local time";

/// Renders prompts from the built-in templates
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    max_hashtags: u32,
}

impl PromptTemplates {
    pub fn new(max_hashtags: u32) -> Self {
        Self { max_hashtags }
    }

    /// Render the caption generation prompt.
    pub fn caption_prompt(
        &self,
        video_context: &str,
        additional_context: Option<&str>,
        tone: Option<&str>,
    ) -> String {
        CAPTION_TEMPLATE
            .replace("{max_hashtags}", &self.max_hashtags.to_string())
            .replace("{tone}", tone.unwrap_or(DEFAULT_TONE))
            .replace("{video_context}", video_context)
            .replace("{additional_context}", additional_context.unwrap_or("none"))
    }

    /// Render the scheduling optimization prompt.
    pub fn scheduling_prompt(
        &self,
        history_data: &str,
        time_window: Option<&str>,
        avoid_times: &str,
        day_type: &str,
        content_type: &str,
    ) -> String {
        let history = if history_data.trim().is_empty() {
            "No historical data available"
        } else {
            history_data
        };
        SCHEDULING_TEMPLATE
            .replace("{time_window}", time_window.unwrap_or(DEFAULT_TIME_WINDOW))
            .replace("{avoid_times}", if avoid_times.is_empty() { "none" } else { avoid_times })
            .replace("{day_type}", day_type)
            .replace("{content_type}", content_type)
            .replace("{history_data}", history)
    }

    /// Loggable identifier for a template. Only the id is logged, never the
    /// rendered prompt.
    pub fn template_id(template_name: &str) -> String {
        format!("{}_v1.0", template_name.trim_end_matches(".md"))
    }

    /// Whether a rendered caption prompt carries the safety rails.
    pub fn is_prompt_safe(&self, prompt: &str) -> bool {
        if prompt.trim().is_empty() {
            return false;
        }
        let lower = prompt.to_lowercase();
        lower.contains("algorithm-safe")
            && lower.contains("non-explicit")
            && prompt.contains(&self.max_hashtags.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_prompt_substitution() {
        let templates = PromptTemplates::new(3);
        let prompt = templates.caption_prompt("ivy_teaser.mp4", Some("@ivy_films"), None);
        assert!(prompt.contains("ivy_teaser.mp4"));
        assert!(prompt.contains("@ivy_films"));
        assert!(prompt.contains("Up to 3 hashtags"));
        assert!(!prompt.contains("{video_context}"));
        assert!(!prompt.contains("{max_hashtags}"));
    }

    #[test]
    fn test_caption_prompt_defaults() {
        let templates = PromptTemplates::new(3);
        let prompt = templates.caption_prompt("clip.mp4", None, None);
        assert!(prompt.contains("Collaborator: none"));
        assert!(prompt.contains(DEFAULT_TONE));
    }

    #[test]
    fn test_scheduling_prompt_substitution() {
        let templates = PromptTemplates::new(3);
        let prompt = templates.scheduling_prompt(
            "- 2025-03-13T18:41:00Z (Thu): 900 impressions",
            None,
            "41, 17",
            "weekday",
            "video teaser",
        );
        assert!(prompt.contains("900 impressions"));
        assert!(prompt.contains("do NOT use: 41, 17"));
        assert!(prompt.contains(DEFAULT_TIME_WINDOW));
        assert!(!prompt.contains("{history_data}"));
    }

    #[test]
    fn test_scheduling_prompt_empty_history() {
        let templates = PromptTemplates::new(3);
        let prompt = templates.scheduling_prompt("", None, "", "weekend", "video teaser");
        assert!(prompt.contains("No historical data available"));
        assert!(prompt.contains("do NOT use: none"));
    }

    #[test]
    fn test_template_id() {
        assert_eq!(
            PromptTemplates::template_id("caption_template.md"),
            "caption_template_v1.0"
        );
    }

    #[test]
    fn test_caption_prompt_is_safe() {
        let templates = PromptTemplates::new(3);
        let prompt = templates.caption_prompt("clip.mp4", None, None);
        assert!(templates.is_prompt_safe(&prompt));
        assert!(!templates.is_prompt_safe(""));
        assert!(!templates.is_prompt_safe("write anything you like"));
    }
}

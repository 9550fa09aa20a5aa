//! Output filename construction and sanitization

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of a sanitized base name, extension included
const MAX_BASE_LEN: usize = 60;

static UNSAFE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("invalid unsafe-run pattern"));

static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("invalid underscore-run pattern"));

/// Sanitize a name into a safe `.mp4` base name.
///
/// Non-ASCII characters are dropped, unsafe runs collapse to a single
/// underscore, leading/trailing underscores are trimmed, and the result is
/// capped at 60 characters before the `.mp4` suffix is ensured.
pub fn sanitize_base(name: &str) -> String {
    let ascii: String = name.chars().filter(char::is_ascii).collect();
    let cleaned = UNSAFE_RUN.replace_all(&ascii, "_");
    let cleaned = UNDERSCORE_RUN.replace_all(&cleaned, "_");
    let mut base = cleaned.trim_matches('_').to_string();
    if base.len() > MAX_BASE_LEN {
        base.truncate(MAX_BASE_LEN);
    }
    if !base.to_lowercase().ends_with(".mp4") {
        base.push_str(".mp4");
    }
    base
}

/// Build a dated output name: `YYYYMMDD_<collab|clip>_<kind>_<NN>.mp4`.
pub fn build_name(date: NaiveDate, collab: Option<&str>, kind: &str, index: u32) -> String {
    let collab = match collab {
        Some(c) if !c.trim().is_empty() => c,
        _ => "clip",
    };
    let base = format!(
        "{}_{}_{}_{:02}.mp4",
        date.format("%Y%m%d"),
        collab,
        kind,
        index
    );
    sanitize_base(&base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_sanitize_collapses_unsafe_runs() {
        assert_eq!(sanitize_base("my cool / video!!.mp4"), "my_cool_video_.mp4");
    }

    #[test]
    fn test_sanitize_trims_underscores_and_adds_extension() {
        assert_eq!(sanitize_base("__edit__"), "edit.mp4");
    }

    #[test]
    fn test_sanitize_drops_non_ascii() {
        assert_eq!(sanitize_base("clip—final.mp4"), "clipfinal.mp4");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "a".repeat(100);
        let result = sanitize_base(&long);
        assert!(result.len() <= MAX_BASE_LEN + 4);
        assert!(result.ends_with(".mp4"));
    }

    #[test]
    fn test_build_name_with_collab() {
        assert_eq!(
            build_name(date(), Some("ivy"), "teaser", 1),
            "20250314_ivy_teaser_01.mp4"
        );
    }

    #[test]
    fn test_build_name_without_collab_falls_back_to_clip() {
        assert_eq!(
            build_name(date(), None, "clip", 2),
            "20250314_clip_clip_02.mp4"
        );
    }
}

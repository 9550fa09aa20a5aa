//! Collaborator resolution from filenames
//!
//! The leading token of an inbox filename names the collaborator; a JSON
//! mapping in the state directory resolves the token to a social handle.

use std::collections::HashMap;
use std::path::Path;

/// Leading tokens that never name a collaborator
const GENERIC_TOKENS: [&str; 3] = ["teaser", "clip", "video"];

/// Parse the collaborator token from a filename.
///
/// The token is the part of the stem before the first `-` or `_`. Generic
/// tokens and blanks yield `None`.
pub fn parse_collab_from_filename(name: &str) -> Option<String> {
    let base = match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    };
    let token = base
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if token.is_empty() || GENERIC_TOKENS.contains(&token.to_lowercase().as_str()) {
        None
    } else {
        Some(token)
    }
}

/// Resolve a collaborator token to a handle via the `collabs.json` mapping.
///
/// A missing file, unreadable mapping, or absent entry all yield `None`.
pub fn load_collab_handle(collabs_path: &Path, collab: &str) -> Option<String> {
    let content = std::fs::read_to_string(collabs_path).ok()?;
    let map: HashMap<String, String> = serde_json::from_str(&content).ok()?;
    map.get(collab).cloned()
}

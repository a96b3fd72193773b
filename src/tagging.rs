//! Keyword tagging for newly ingested articles.

use crate::config::TaggingConfig;
use std::collections::BTreeSet;

/// Tags whose keywords appear in the title or body, in config order, capped
/// at `max_tags`.
pub fn detect_tags(config: &TaggingConfig, title: &str, body: &str) -> BTreeSet<String> {
    let text = format!("{title} {body}").to_lowercase();
    config
        .keywords
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| text.contains(&kw.to_lowercase())))
        .map(|(tag, _)| tag.clone())
        .take(config.max_tags)
        .collect()
}

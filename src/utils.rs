//! Utility functions for URL identity, text cleanup, and file system operations.
//!
//! - URL normalization and stable article ids
//! - Whitespace collapsing and short summaries
//! - String truncation for logging
//! - Atomic writes and output directory validation

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::StoreError;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

const SUMMARY_MAX_CHARS: usize = 300;

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the bytes dropped.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of characters to keep
///
/// # Returns
///
/// The original string if it fits, otherwise a prefix with `"…(+N bytes)"`
/// appended. The cut always falls on a character boundary.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        None => s,
        Some((cut, _)) => &s[..cut],
    }
}

/// Host of `url`, lowercased, without a leading `www.`.
///
/// # Returns
///
/// `None` when `url` does not parse or has no host.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(domain_of("https://WWW.WSJ.com/articles/x").as_deref(), Some("wsj.com"));
/// assert_eq!(domain_of("not a url"), None);
/// ```
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// True when `domain` equals `suffix` or is a subdomain of it.
///
/// Matching is on whole labels, so `microsoft.com` is not under `ft.com`.
///
/// # Examples
///
/// ```ignore
/// assert!(domain_matches("markets.ft.com", "ft.com"));
/// assert!(!domain_matches("microsoft.com", "ft.com"));
/// ```
pub fn domain_matches(domain: &str, suffix: &str) -> bool {
    let domain = domain.to_lowercase();
    let suffix = suffix.to_lowercase();
    domain == suffix || domain.ends_with(&format!(".{suffix}"))
}

fn is_tracking_param(key: &str, tracking: &[String]) -> bool {
    let key = key.to_lowercase();
    tracking.iter().any(|t| match t.strip_suffix('*') {
        Some(prefix) => key.starts_with(&prefix.to_lowercase()),
        None => key == t.to_lowercase(),
    })
}

/// Normalize a source URL into its canonical form.
///
/// Scheme and host are lowercased, the fragment and tracking query
/// parameters are dropped, the remaining parameters are sorted, and a
/// trailing slash on the path is removed.
///
/// # Arguments
///
/// * `raw` - The URL as supplied by the caller
/// * `tracking` - Query keys to drop; a trailing `*` matches a prefix
///
/// # Returns
///
/// The canonical URL string, or the parse error for input that is not an
/// absolute URL.
///
/// # Examples
///
/// ```ignore
/// let tracking = vec!["utm_*".to_string()];
/// assert_eq!(
///     normalize_url("HTTPS://Example.com/a/?utm_source=x&b=2#top", &tracking)?,
///     "https://example.com/a?b=2"
/// );
/// ```
pub fn normalize_url(raw: &str, tracking: &[String]) -> Result<String, url::ParseError> {
    let mut url = Url::parse(raw.trim())?;
    url.set_fragment(None);

    let kept: BTreeMap<String, Vec<String>> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k, tracking))
        .fold(BTreeMap::new(), |mut acc, (k, v)| {
            acc.entry(k.into_owned()).or_default().push(v.into_owned());
            acc
        });
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, values) in &kept {
            for v in values {
                pairs.append_pair(k, v);
            }
        }
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    let mut out = url.to_string();
    // `Url` always renders an empty path as "/"
    if url.path() == "/" && url.query().is_none() {
        out = out.trim_end_matches('/').to_string();
    }
    Ok(out)
}

/// Stable article id derived from an already-normalized URL.
///
/// The id is `news_` followed by the first 16 hex digits of the URL's
/// SHA-256, so equal URLs always map to the same id across runs.
pub fn article_id(normalized_url: &str) -> String {
    let digest = Sha256::digest(normalized_url.as_bytes());
    let mut id = String::from("news_");
    for byte in &digest[..8] {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

/// Short summary: the first few sentences, capped at 300 characters.
///
/// # Arguments
///
/// * `text` - Article body, paragraphs joined by whitespace
///
/// # Returns
///
/// Up to three sentences longer than 20 characters, joined and ending in a
/// period. Text without two such sentences is returned whole, or cut at 300
/// characters with `"..."` appended.
pub fn summarize(text: &str) -> String {
    let text = collapse_whitespace(text);
    let sentences: Vec<&str> = SENTENCE_END
        .split(&text)
        .map(str::trim)
        .filter(|s| s.chars().count() > 20)
        .collect();

    if sentences.len() >= 2 {
        let mut parts: Vec<&str> = Vec::new();
        let mut total = 0usize;
        for sentence in sentences.iter().take(3) {
            let len = sentence.chars().count();
            if total + len >= SUMMARY_MAX_CHARS {
                break;
            }
            parts.push(sentence.trim_end_matches(['.', '!', '?']));
            total += len + 1;
        }
        if !parts.is_empty() {
            return format!("{}.", parts.join(". "));
        }
    }

    if text.chars().count() > SUMMARY_MAX_CHARS {
        format!("{}...", truncate_chars(&text, SUMMARY_MAX_CHARS))
    } else {
        text
    }
}

/// A file written next to its destination but not yet moved into place.
///
/// Several files can be staged and then committed together, so a failure
/// while writing any of them leaves every destination untouched.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    path: PathBuf,
}

impl StagedFile {
    /// Move the staged bytes over the destination with a rename.
    pub async fn commit(self) -> Result<(), StoreError> {
        fs::rename(&self.tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(self.path.display(), e))?;
        debug!(path = %self.path.display(), "Committed staged file");
        Ok(())
    }

    /// Remove the temp file, leaving the destination as it was.
    pub async fn discard(self) {
        let _ = fs::remove_file(&self.tmp).await;
    }
}

/// Write `bytes` to a sibling temp file of `path`, creating parent
/// directories as needed.
///
/// # Arguments
///
/// * `path` - Final destination of the file
/// * `bytes` - Full contents to write
///
/// # Returns
///
/// A [`StagedFile`] that replaces `path` only when committed.
///
/// # Errors
///
/// [`StoreError::Io`] if a directory or the temp file cannot be written.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn stage_file(path: &Path, bytes: &[u8]) -> Result<StagedFile, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent.display(), e))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::io(tmp.display(), e))?;
    debug!(bytes = bytes.len(), "Staged file");
    Ok(StagedFile {
        tmp,
        path: path.to_path_buf(),
    })
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so
/// readers never observe a half-written file.
///
/// # Examples
///
/// ```ignore
/// write_atomic(Path::new("data/session.json"), b"{}").await?;
/// ```
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    stage_file(path, bytes).await?.commit().await
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Arguments
///
/// * `path` - The directory path to validate
///
/// # Errors
///
/// Returns [`StoreError::Io`] if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| StoreError::io(path.display(), e))?;
    let probe_path = path.join("..__probe_write__");
    fs::write(&probe_path, b"")
        .await
        .map_err(|e| StoreError::io(probe_path.display(), e))?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking() -> Vec<String> {
        vec!["utm_*".to_string(), "fbclid".to_string(), "mod".to_string()]
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with("ééé…"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b   c "), "a b c");
    }

    #[test]
    fn test_domain_of_strips_www() {
        assert_eq!(
            domain_of("https://WWW.WSJ.com/articles/x").as_deref(),
            Some("wsj.com")
        );
        assert_eq!(domain_of("not a url"), None);
    }

    #[test]
    fn test_domain_matches_suffix() {
        assert!(domain_matches("markets.ft.com", "ft.com"));
        assert!(domain_matches("FT.com", "ft.com"));
        assert!(!domain_matches("microsoft.com", "ft.com"));
    }

    #[test]
    fn test_normalize_url_lowercases_and_strips() {
        let n = normalize_url(
            "HTTPS://WWW.Example.COM/News/Story/?utm_source=x&b=2&fbclid=1&a=1#top",
            &tracking(),
        )
        .unwrap();
        assert_eq!(n, "https://www.example.com/News/Story?a=1&b=2");
    }

    #[test]
    fn test_normalize_url_bare_host() {
        let n = normalize_url("https://example.com/?utm_medium=email", &tracking()).unwrap();
        assert_eq!(n, "https://example.com");
    }

    #[test]
    fn test_normalize_url_is_stable() {
        let once = normalize_url("https://example.com/a/?mod=rss&x=1", &tracking()).unwrap();
        let twice = normalize_url(&once, &tracking()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_article_id_is_stable_and_prefixed() {
        let a = article_id("https://example.com/a");
        assert_eq!(a, article_id("https://example.com/a"));
        assert_ne!(a, article_id("https://example.com/b"));
        assert!(a.starts_with("news_"));
        assert_eq!(a.len(), "news_".len() + 16);
    }

    #[test]
    fn test_summarize_takes_leading_sentences() {
        let text = "The central bank held its benchmark rate steady on Wednesday. \
                    Officials signaled they expect two cuts later this year. \
                    Markets rallied on the news across the board. \
                    A fourth sentence that should not appear in the summary.";
        let summary = summarize(text);
        assert!(summary.starts_with("The central bank held"));
        assert!(summary.ends_with('.'));
        assert!(!summary.contains("fourth sentence"));
        assert!(summary.chars().count() <= 301);
    }

    #[test]
    fn test_summarize_falls_back_to_prefix() {
        let text = "x".repeat(400);
        let summary = summarize(&text);
        assert_eq!(summary.chars().count(), 303);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_summarize_short_text_unchanged() {
        assert_eq!(summarize("Short note"), "Short note");
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");
        write_atomic(&path, b"one").await.unwrap();
        write_atomic(&path, b"two").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        assert!(!dir.path().join("nested").join(".file.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_discarded_stage_leaves_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.json");
        write_atomic(&path, b"one").await.unwrap();
        stage_file(&path, b"two").await.unwrap().discard().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one");
        assert!(!dir.path().join(".file.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        ensure_writable_dir(&target).await.unwrap();
        assert!(target.is_dir());
    }
}

//! Data models shared by the ingestion and rendering halves of the pipeline.
//!
//! - [`ArticleDraft`]: what the extractor produces from one page
//! - [`Article`]: the persisted record in the dataset file
//! - [`ArticleUpdate`]: a partial record handed to the merger
//! - [`ContentDocument`]: the full paragraph sequence, stored beside the dataset
//! - [`ListingEntry`]: the public view of a record
//! - [`Session`] / [`Role`]: the viewer's local, time-bounded claim of identity
//!
//! The two halves of the system share only the [`Article`] schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Structured content pulled out of one rendered page.
///
/// Drafts are deterministic: the same markup always yields an identical draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleDraft {
    pub title: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Non-empty, whitespace-collapsed text blocks in display order.
    pub paragraphs: Vec<String>,
    /// Name of the strategy that produced this draft.
    pub strategy: String,
}

impl ArticleDraft {
    /// Combined length of all paragraphs, in characters.
    pub fn char_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.chars().count()).sum()
    }

    /// Paragraphs joined with blank lines, used for tagging and summaries.
    pub fn body_text(&self) -> String {
        self.paragraphs.join("\n\n")
    }
}

/// A persisted article record.
///
/// Full content is never inlined here: it lives in a [`ContentDocument`]
/// referenced by `content_path`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    pub id: String,
    /// Normalized source URL; also the external link shown to blocked viewers.
    pub source_url: String,
    /// Publisher display name.
    #[serde(default)]
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub has_paywall: bool,
    #[serde(default)]
    pub content_path: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl Article {
    /// Bare domain of the source URL, without a leading `www.`.
    pub fn source_domain(&self) -> Option<String> {
        crate::utils::domain_of(&self.source_url)
    }

    /// The timestamp used for display ordering.
    pub fn display_date(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.scraped_at)
    }

    pub fn to_listing(&self) -> ListingEntry {
        ListingEntry {
            id: self.id.clone(),
            title: self.title.clone(),
            source: self.source.clone(),
            source_url: self.source_url.clone(),
            author: self.author.clone(),
            published_at: self.published_at,
            summary: self.summary.clone(),
            tags: self.tags.clone(),
            has_paywall: self.has_paywall,
            content_path: if self.has_paywall {
                None
            } else {
                self.content_path.clone()
            },
            scraped_at: self.scraped_at,
        }
    }
}

/// A partial article record.
///
/// `None` means "not supplied": the merger leaves the stored value alone.
/// `seed_tags` are applied only when the record is inserted, so tags curated
/// by hand survive an automated re-scrape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleUpdate {
    pub source_url: String,
    pub source: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub seed_tags: BTreeSet<String>,
    pub has_paywall: Option<bool>,
    pub content_path: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl ArticleUpdate {
    pub fn for_url(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ..Default::default()
        }
    }
}

/// The persisted full text of one article.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContentDocument {
    pub id: String,
    pub title: String,
    pub source_url: String,
    pub paragraphs: Vec<String>,
}

impl ContentDocument {
    pub fn char_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.chars().count()).sum()
    }
}

/// The public listing view of an [`Article`].
///
/// `content_path` is withheld for paywalled records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub id: String,
    pub title: String,
    pub source: String,
    pub source_url: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub tags: BTreeSet<String>,
    pub has_paywall: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Viewer role. Anything that is not exactly `member` parses as [`Role::Free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    #[default]
    Free,
    Member,
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from(value.as_str())
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "member" => Role::Member,
            _ => Role::Free,
        }
    }
}

/// The viewer's local session.
///
/// This is a demo trust token: nothing here is cryptographically verified.
/// The token is opaque and only checked for presence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Session {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_article() -> Article {
        Article {
            id: "news_0123456789abcdef".to_string(),
            source_url: "https://wsj.com/articles/fed-holds".to_string(),
            source: "The Wall Street Journal".to_string(),
            title: "Fed Holds Rates".to_string(),
            author: None,
            published_at: None,
            summary: "The Fed held rates steady.".to_string(),
            tags: BTreeSet::new(),
            has_paywall: true,
            content_path: Some("data/news/news_0123456789abcdef.json".to_string()),
            scraped_at: Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_article_roundtrip_keeps_absent_optionals() {
        let article = sample_article();
        let json = serde_json::to_string(&article).unwrap();
        assert!(json.contains("\"author\":null"));
        let back: Article = serde_json::from_str(&json).unwrap();
        assert_eq!(back, article);
    }

    #[test]
    fn test_listing_hides_content_path_for_paywalled() {
        let listing = sample_article().to_listing();
        assert_eq!(listing.content_path, None);
        let json = serde_json::to_string(&listing).unwrap();
        assert!(!json.contains("content_path"));
    }

    #[test]
    fn test_listing_keeps_content_path_for_open() {
        let mut article = sample_article();
        article.has_paywall = false;
        assert!(article.to_listing().content_path.is_some());
    }

    #[test]
    fn test_display_date_falls_back_to_scraped_at() {
        let mut article = sample_article();
        assert_eq!(article.display_date(), article.scraped_at);
        let published = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        article.published_at = Some(published);
        assert_eq!(article.display_date(), published);
    }

    #[test]
    fn test_role_parsing_fails_closed() {
        assert_eq!(Role::from("member"), Role::Member);
        assert_eq!(Role::from("free"), Role::Free);
        assert_eq!(Role::from("admin"), Role::Free);
        assert_eq!(Role::from("Member"), Role::Free);
        assert_eq!(Role::from(""), Role::Free);
    }

    #[test]
    fn test_session_with_unknown_role_deserializes_as_free() {
        let json = r#"{
            "email": "reader@example.com",
            "display_name": "Reader",
            "role": "superuser",
            "token": "opaque",
            "issued_at": "2025-05-06T10:00:00Z",
            "expires_at": "2025-05-07T10:00:00Z"
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.role, Role::Free);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"member\"");
    }

    #[test]
    fn test_draft_char_count() {
        let draft = ArticleDraft {
            title: "T".to_string(),
            author: None,
            published_at: None,
            paragraphs: vec!["héllo".to_string(), "world".to_string()],
            strategy: "test".to_string(),
        };
        assert_eq!(draft.char_count(), 10);
        assert_eq!(draft.body_text(), "héllo\n\nworld");
    }
}

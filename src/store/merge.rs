//! Pure, deterministic merge of one partial record into the dataset.
//!
//! `merge` is idempotent (`merge(merge(ds, r), r) == merge(ds, r)`) and
//! commutes across records with distinct ids, because:
//!
//! - the id is a pure function of the normalized source URL
//! - each field is last-write-wins and `scraped_at` only moves forward
//! - the dataset is kept in one total order (display date descending, then id)
//! - the clock is an argument, never read inside

use crate::error::{MergeConflict, StoreError};
use crate::models::{Article, ArticleUpdate};
use crate::utils::{article_id, domain_of, normalize_url};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

const UNTITLED: &str = "Untitled";
const NO_SUMMARY: &str = "No summary available.";

/// How source URLs map to article ids.
#[derive(Debug, Clone, Default)]
pub struct IdScheme {
    tracking_params: Vec<String>,
}

impl IdScheme {
    pub fn new(tracking_params: Vec<String>) -> Self {
        Self { tracking_params }
    }

    pub fn normalize(&self, url: &str) -> Result<String, StoreError> {
        normalize_url(url, &self.tracking_params)
            .map_err(|e| StoreError::InvalidUrl(format!("{url}: {e}")))
    }

    /// `(normalized_url, id)` for a raw source URL.
    pub fn identify(&self, url: &str) -> Result<(String, String), StoreError> {
        let normalized = self.normalize(url)?;
        let id = article_id(&normalized);
        Ok((normalized, id))
    }
}

/// The article dataset, always in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Dataset {
    articles: Vec<Article>,
}

impl Dataset {
    pub fn from_articles(mut articles: Vec<Article>) -> Self {
        sort_for_display(&mut articles);
        Self { articles }
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }
}

fn sort_for_display(articles: &mut [Article]) {
    articles.sort_by(|a, b| {
        (Reverse(a.display_date()), &a.id).cmp(&(Reverse(b.display_date()), &b.id))
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    /// Names of the fields whose stored value changed.
    Updated { changed: Vec<&'static str> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub dataset: Dataset,
    pub id: String,
    pub outcome: MergeOutcome,
}

fn set<T: PartialEq>(
    slot: &mut T,
    value: Option<T>,
    name: &'static str,
    changed: &mut Vec<&'static str>,
) {
    if let Some(value) = value {
        if *slot != value {
            *slot = value;
            changed.push(name);
        }
    }
}

/// Merge `update` into `existing`, returning the new dataset.
///
/// An existing record keeps every field the update does not supply. A new
/// record with no paywall flag is treated as paywalled, and one with no
/// `scraped_at` is stamped with `now`.
///
/// # Errors
///
/// - [`StoreError::InvalidUrl`] when the source URL cannot be normalized
/// - [`StoreError::Conflict`] when the id is taken by a different URL
pub fn merge(
    existing: &Dataset,
    update: &ArticleUpdate,
    ids: &IdScheme,
    now: DateTime<Utc>,
) -> Result<Merged, StoreError> {
    let (normalized, id) = ids.identify(&update.source_url)?;
    let mut articles = existing.articles.clone();

    let outcome = match articles.iter().position(|a| a.id == id) {
        Some(index) => {
            let current = &mut articles[index];
            let current_normalized = ids
                .normalize(&current.source_url)
                .unwrap_or_else(|_| current.source_url.clone());
            if current_normalized != normalized {
                return Err(MergeConflict {
                    id,
                    existing_url: current.source_url.clone(),
                    incoming_url: normalized,
                }
                .into());
            }

            let mut changed = Vec::new();
            set(&mut current.source_url, Some(normalized), "source_url", &mut changed);
            set(&mut current.source, update.source.clone(), "source", &mut changed);
            set(&mut current.title, update.title.clone(), "title", &mut changed);
            set(&mut current.author, update.author.clone().map(Some), "author", &mut changed);
            set(
                &mut current.published_at,
                update.published_at.map(Some),
                "published_at",
                &mut changed,
            );
            set(&mut current.summary, update.summary.clone(), "summary", &mut changed);
            set(&mut current.tags, update.tags.clone(), "tags", &mut changed);
            set(&mut current.has_paywall, update.has_paywall, "has_paywall", &mut changed);
            set(
                &mut current.content_path,
                update.content_path.clone().map(Some),
                "content_path",
                &mut changed,
            );
            let advanced = update.scraped_at.filter(|t| *t > current.scraped_at);
            set(&mut current.scraped_at, advanced, "scraped_at", &mut changed);
            MergeOutcome::Updated { changed }
        }
        None => {
            articles.push(Article {
                id: id.clone(),
                source: update
                    .source
                    .clone()
                    .or_else(|| domain_of(&normalized))
                    .unwrap_or_default(),
                source_url: normalized,
                title: update.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
                author: update.author.clone(),
                published_at: update.published_at,
                summary: update.summary.clone().unwrap_or_else(|| NO_SUMMARY.to_string()),
                tags: update.tags.clone().unwrap_or_else(|| update.seed_tags.clone()),
                has_paywall: update.has_paywall.unwrap_or(true),
                content_path: update.content_path.clone(),
                scraped_at: update.scraped_at.unwrap_or(now),
            });
            MergeOutcome::Inserted
        }
    };

    sort_for_display(&mut articles);
    Ok(Merged {
        dataset: Dataset { articles },
        id,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use std::collections::BTreeSet;

    fn ids() -> IdScheme {
        IdScheme::new(vec!["utm_*".to_string(), "mod".to_string()])
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, day, hour, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        at(8, 12)
    }

    fn update(url: &str, title: &str, scraped: DateTime<Utc>) -> ArticleUpdate {
        ArticleUpdate {
            source_url: url.to_string(),
            source: Some("Example".to_string()),
            title: Some(title.to_string()),
            summary: Some(format!("{title} summary.")),
            has_paywall: Some(false),
            content_path: Some(format!("data/news/{title}.json")),
            scraped_at: Some(scraped),
            ..Default::default()
        }
    }

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_insert_then_lookup_by_normalized_id() {
        let r = update("https://Example.com/a/?utm_source=x", "A", at(1, 9));
        let merged = merge(&Dataset::default(), &r, &ids(), now()).unwrap();
        assert_eq!(merged.outcome, MergeOutcome::Inserted);
        let article = merged.dataset.get(&merged.id).unwrap();
        assert_eq!(article.source_url, "https://example.com/a");
        assert_eq!(merged.id, article_id("https://example.com/a"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let base = merge(&Dataset::default(), &update("https://example.com/x", "X", at(1, 8)), &ids(), now())
            .unwrap()
            .dataset;
        let r = update("https://example.com/y", "Y", at(2, 8));
        let once = merge(&base, &r, &ids(), now()).unwrap();
        let twice = merge(&once.dataset, &r, &ids(), now()).unwrap();
        assert_eq!(once.dataset, twice.dataset);
        assert_eq!(twice.outcome, MergeOutcome::Updated { changed: vec![] });
    }

    #[test]
    fn test_merge_commutes_across_distinct_ids() {
        let r1 = update("https://example.com/one", "One", at(3, 8));
        let r2 = update("https://example.com/two", "Two", at(3, 8));
        let ds = Dataset::default();
        let a = merge(&merge(&ds, &r1, &ids(), now()).unwrap().dataset, &r2, &ids(), now()).unwrap();
        let b = merge(&merge(&ds, &r2, &ids(), now()).unwrap().dataset, &r1, &ids(), now()).unwrap();
        assert_eq!(a.dataset, b.dataset);
    }

    #[test]
    fn test_bare_inserts_commute_with_a_fixed_clock() {
        let r1 = ArticleUpdate::for_url("https://example.com/one");
        let r2 = ArticleUpdate::for_url("https://example.com/two");
        let ds = Dataset::default();
        let a = merge(&merge(&ds, &r1, &ids(), now()).unwrap().dataset, &r2, &ids(), now()).unwrap();
        let b = merge(&merge(&ds, &r2, &ids(), now()).unwrap().dataset, &r1, &ids(), now()).unwrap();
        assert_eq!(a.dataset, b.dataset);
        assert!(a.dataset.articles().iter().all(|x| x.scraped_at == now()));
    }

    #[test]
    fn test_reingest_only_advances_scraped_at_and_keeps_tags() {
        let url = "https://example.com/story";
        let first = merge(&Dataset::default(), &update(url, "Story", at(1, 8)), &ids(), now()).unwrap();

        let curate = ArticleUpdate {
            tags: Some(tags(&["Curated"])),
            ..ArticleUpdate::for_url(url)
        };
        let curated = merge(&first.dataset, &curate, &ids(), now()).unwrap();

        let mut rescrape = update(url, "Story", at(2, 8));
        rescrape.seed_tags = tags(&["Auto"]);
        let again = merge(&curated.dataset, &rescrape, &ids(), now()).unwrap();

        assert_eq!(
            again.outcome,
            MergeOutcome::Updated {
                changed: vec!["scraped_at"]
            }
        );
        let stored = again.dataset.get(&again.id).unwrap();
        assert_eq!(stored.tags, tags(&["Curated"]));
        assert_eq!(stored.scraped_at, at(2, 8));
    }

    #[test]
    fn test_scraped_at_never_moves_backwards() {
        let url = "https://example.com/story";
        let first = merge(&Dataset::default(), &update(url, "Story", at(5, 8)), &ids(), now()).unwrap();
        let stale = merge(&first.dataset, &update(url, "Story", at(1, 8)), &ids(), now()).unwrap();
        assert_eq!(stale.dataset.get(&stale.id).unwrap().scraped_at, at(5, 8));
    }

    #[test]
    fn test_partial_update_preserves_unsupplied_fields() {
        let url = "https://example.com/story";
        let mut full = update(url, "Story", at(1, 8));
        full.author = Some("Jane Doe".to_string());
        let first = merge(&Dataset::default(), &full, &ids(), now()).unwrap();

        let flag_only = ArticleUpdate {
            has_paywall: Some(true),
            ..ArticleUpdate::for_url(url)
        };
        let merged = merge(&first.dataset, &flag_only, &ids(), now()).unwrap();
        let stored = merged.dataset.get(&merged.id).unwrap();
        assert!(stored.has_paywall);
        assert_eq!(stored.author.as_deref(), Some("Jane Doe"));
        assert_eq!(stored.title, "Story");
        assert_eq!(stored.scraped_at, at(1, 8));
    }

    #[test]
    fn test_insert_defaults_fail_closed() {
        let merged = merge(
            &Dataset::default(),
            &ArticleUpdate::for_url("https://example.com/bare"),
            &ids(),
            now(),
        )
        .unwrap();
        let stored = merged.dataset.get(&merged.id).unwrap();
        assert!(stored.has_paywall);
        assert_eq!(stored.title, "Untitled");
        assert_eq!(stored.source, "example.com");
        assert_eq!(stored.content_path, None);
        assert_eq!(stored.scraped_at, now());
    }

    #[test]
    fn test_sorted_by_published_then_scraped() {
        let mut old = update("https://example.com/old", "Old", at(9, 8));
        old.published_at = Some(at(1, 0));
        let recent = update("https://example.com/recent", "Recent", at(5, 8));
        let mut newest = update("https://example.com/newest", "Newest", at(2, 8));
        newest.published_at = Some(at(7, 0));

        let mut ds = Dataset::default();
        for r in [&old, &recent, &newest] {
            ds = merge(&ds, r, &ids(), now()).unwrap().dataset;
        }
        let titles: Vec<&str> = ds.articles().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Newest", "Recent", "Old"]);
    }

    #[test]
    fn test_conflicting_url_for_same_id_is_reported() {
        let r = update("https://example.com/a", "A", at(1, 8));
        let merged = merge(&Dataset::default(), &r, &ids(), now()).unwrap();

        // simulate a legacy record that shares the id but not the URL
        let mut articles = merged.dataset.articles().to_vec();
        articles[0].source_url = "https://other.example.com/b".to_string();
        let tampered = Dataset::from_articles(articles);

        let err = merge(&tampered, &r, &ids(), now()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(MergeConflict { .. })));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let err = merge(
            &Dataset::default(),
            &ArticleUpdate::for_url("not a url"),
            &ids(),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUrl(_)));
    }
}

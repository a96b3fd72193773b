//! Per-article ingestion: fetch, extract, classify, commit.
//!
//! Each article is its own unit of work. A failure is logged against its URL
//! and the batch moves on; nothing reaches the store unless extraction
//! produced a complete draft.
//!
//! With more than one worker, URLs are dealt round-robin and every worker
//! owns its own [`PageSource`]. Commits are still serialized by the store.

use crate::browser::{PageSource, fetch_with_timeout};
use crate::classify::PaywallClassifier;
use crate::config::{Config, TaggingConfig};
use crate::error::{AppError, ExtractionFailure};
use crate::extract::Extractor;
use crate::models::ArticleUpdate;
use crate::store::ArticleStore;
use crate::store::merge::MergeOutcome;
use crate::tagging::detect_tags;
use crate::utils::{domain_matches, domain_of, summarize, truncate_for_log};
use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{Instrument, error, info, info_span, instrument};
use url::Url;

/// Result of one successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub id: String,
    pub url: String,
    pub title: String,
    pub strategy: String,
    pub chars: usize,
    pub has_paywall: bool,
    pub outcome: MergeOutcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub ingested: Vec<Ingested>,
    pub failed: Vec<(String, AppError)>,
}

impl BatchReport {
    /// Exit code for the batch: the first failure's code, or 0.
    pub fn exit_code(&self) -> u8 {
        self.failed
            .first()
            .map(|(_, e)| e.exit_code())
            .unwrap_or(0)
    }
}

pub struct Ingestor<'a> {
    store: &'a ArticleStore,
    extractor: Extractor,
    classifier: PaywallClassifier,
    tagging: TaggingConfig,
    publishers: BTreeMap<String, String>,
    timeout: Duration,
}

impl<'a> Ingestor<'a> {
    pub fn new(config: &Config, store: &'a ArticleStore) -> Self {
        Self {
            store,
            extractor: Extractor::new(&config.extraction),
            classifier: PaywallClassifier::new(&config.paywall),
            tagging: config.tagging.clone(),
            publishers: config.publishers.clone(),
            timeout: config.extraction.timeout(),
        }
    }

    /// Publisher display name for a domain, falling back to the domain itself.
    pub fn publisher_name(&self, domain: &str) -> String {
        self.publishers
            .iter()
            .find(|(suffix, _)| domain_matches(domain, suffix))
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| domain.to_string())
    }

    /// Ingest a single article URL using `source`.
    #[instrument(level = "info", skip(self, source))]
    pub async fn ingest_one<S: PageSource>(
        &self,
        source: &mut S,
        url: &str,
    ) -> Result<Ingested, AppError> {
        let t0 = Instant::now();
        let is_web = Url::parse(url.trim())
            .is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
        let domain = match domain_of(url.trim()) {
            Some(domain) if is_web => domain,
            _ => return Err(ExtractionFailure::InvalidUrl(url.to_string()).into()),
        };

        let page = fetch_with_timeout(source, url, self.timeout).await?;
        let draft = self.extractor.extract(&page.markup, &domain)?;
        let chars = draft.char_count();
        let has_paywall = self.classifier.classify(&domain, chars);
        let body = draft.body_text();

        let update = ArticleUpdate {
            source: Some(self.publisher_name(&domain)),
            title: Some(draft.title.clone()),
            author: draft.author.clone(),
            published_at: draft.published_at,
            summary: Some(summarize(&body)),
            seed_tags: detect_tags(&self.tagging, &draft.title, &body),
            has_paywall: Some(has_paywall),
            scraped_at: Some(Utc::now()),
            ..ArticleUpdate::for_url(url)
        };
        let report = self.store.commit(update, Some(draft.paragraphs)).await?;

        info!(
            id = %report.id,
            title = %truncate_for_log(&draft.title, 80),
            strategy = %draft.strategy,
            chars,
            has_paywall,
            outcome = ?report.outcome,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Ingested article"
        );
        Ok(Ingested {
            id: report.id,
            url: url.to_string(),
            title: draft.title,
            strategy: draft.strategy,
            chars,
            has_paywall,
            outcome: report.outcome,
        })
    }

    /// Ingest `urls` with `sources.len()` workers, one source per worker.
    /// `sources` must not be empty.
    ///
    /// Every URL is attempted; failures are collected, not propagated. The
    /// sources are handed back so callers can inspect or reuse them.
    pub async fn ingest_batch<S: PageSource>(
        &self,
        urls: &[String],
        mut sources: Vec<S>,
    ) -> (BatchReport, Vec<S>) {
        let workers = sources.len().max(1);
        let mut lanes: Vec<Vec<(usize, &String)>> = vec![Vec::new(); workers];
        for (i, url) in urls.iter().enumerate() {
            lanes[i % workers].push((i, url));
        }
        info!(urls = urls.len(), workers = sources.len(), "Starting ingestion batch");

        let runs = sources
            .iter_mut()
            .zip(lanes)
            .enumerate()
            .map(|(worker, (source, lane))| {
                async move {
                    let mut results = Vec::with_capacity(lane.len());
                    for (i, url) in lane {
                        let result = self.ingest_one(source, url).await;
                        if let Err(e) = &result {
                            error!(%url, error = %e, "Article failed; continuing batch");
                        }
                        results.push((i, url.clone(), result));
                    }
                    results
                }
                .instrument(info_span!("worker", worker))
            });

        let mut results: Vec<_> = join_all(runs).await.into_iter().flatten().collect();
        results.sort_by_key(|(i, _, _)| *i);

        let mut report = BatchReport::default();
        for (_, url, result) in results {
            match result {
                Ok(done) => report.ingested.push(done),
                Err(e) => report.failed.push((url, e)),
            }
        }
        info!(
            ingested = report.ingested.len(),
            failed = report.failed.len(),
            "Ingestion batch finished"
        );
        (report, sources)
    }
}

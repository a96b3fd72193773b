//! Selector-chain extraction of article content from rendered markup.
//!
//! The [`Extractor`] holds an ordered list of [`Strategy`] values and tries
//! them one at a time. The first candidate that passes the plausibility check
//! becomes the [`ArticleDraft`]:
//!
//! 1. at least one paragraph survives boilerplate stripping
//! 2. a title is found, in the body or in the document metadata
//! 3. combined paragraph text reaches the configured minimum
//! 4. at most one false-positive signature (cookie banner, paywall prompt)
//!
//! When every strategy is rejected the caller gets
//! [`ExtractionFailure::NoStrategyMatched`] with the reason for each attempt.
//! Content is never fabricated, and the same markup always produces the same
//! draft.

pub mod metadata;
pub mod normalize;
pub mod strategies;

use crate::config::ExtractionConfig;
use crate::error::{ExtractionFailure, Rejection, StrategyAttempt};
use crate::models::ArticleDraft;
use itertools::Itertools;
use metadata::DocumentMeta;
use normalize::Boilerplate;
use scraper::Html;
use strategies::{Candidate, Strategy};
use tracing::{debug, info, instrument, warn};

/// Phrases that show up when the page is a cookie wall or a paywall prompt
/// rather than an article.
const FALSE_POSITIVE_SIGNATURES: &[&str] = &[
    "accept all cookies",
    "we use cookies",
    "cookie policy",
    "cookie settings",
    "subscribe to read",
    "sign up to continue",
    "create a free account",
    "you have reached your",
    "free articles remaining",
    "register to read",
    "this article is for subscribers",
    "unlock this article",
    "please enable javascript",
];

#[derive(Debug, Clone)]
pub struct Extractor {
    strategies: Vec<Strategy>,
    boilerplate: Boilerplate,
    min_chars: usize,
}

impl Extractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self::with_strategies(Strategy::default_chain(), config)
    }

    pub fn with_strategies(strategies: Vec<Strategy>, config: &ExtractionConfig) -> Self {
        Self {
            strategies,
            boilerplate: Boilerplate::new(&config.boilerplate),
            min_chars: config.min_chars,
        }
    }

    /// Strategies in the order they will be tried for `source_domain`.
    ///
    /// Strategies with affinity for the domain move to the front; relative
    /// order is otherwise preserved.
    pub fn ordered(&self, source_domain: &str) -> Vec<&Strategy> {
        self.strategies
            .iter()
            .sorted_by_key(|s| !s.has_affinity(source_domain))
            .collect()
    }

    /// Extract a draft from one page's markup.
    #[instrument(level = "info", skip_all, fields(domain = %source_domain, bytes = markup.len()))]
    pub fn extract(
        &self,
        markup: &str,
        source_domain: &str,
    ) -> Result<ArticleDraft, ExtractionFailure> {
        let document = Html::parse_document(markup);
        let meta = DocumentMeta::read(&document);
        let mut attempts = Vec::new();

        for strategy in self.ordered(source_domain) {
            let outcome = match strategy.apply(&document) {
                Some(candidate) => self.check(strategy, candidate, &meta),
                None => Err(Rejection::NoContent),
            };
            match outcome {
                Ok(draft) => {
                    info!(
                        strategy = %draft.strategy,
                        paragraphs = draft.paragraphs.len(),
                        chars = draft.char_count(),
                        rejected = attempts.len(),
                        "Extracted article"
                    );
                    return Ok(draft);
                }
                Err(rejection) => {
                    debug!(strategy = %strategy.name(), %rejection, "Strategy rejected");
                    attempts.push(StrategyAttempt {
                        strategy: strategy.name().to_string(),
                        rejection,
                    });
                }
            }
        }

        warn!(attempted = attempts.len(), "No extraction strategy matched");
        Err(ExtractionFailure::NoStrategyMatched { attempts })
    }

    fn check(
        &self,
        strategy: &Strategy,
        candidate: Candidate,
        meta: &DocumentMeta,
    ) -> Result<ArticleDraft, Rejection> {
        let signatures = signatures_in(&candidate.blocks);
        let paragraphs = self.boilerplate.paragraphs(&candidate.blocks);
        if paragraphs.is_empty() {
            return Err(Rejection::NoContent);
        }

        let title = candidate
            .title
            .filter(|t| !t.is_empty())
            .or_else(|| meta.title.clone())
            .ok_or(Rejection::EmptyTitle)?;

        let chars: usize = paragraphs.iter().map(|p| p.chars().count()).sum();
        if chars < self.min_chars {
            return Err(Rejection::TooShort {
                chars,
                min: self.min_chars,
            });
        }

        if signatures.len() > 1 {
            return Err(Rejection::FalsePositive { signatures });
        }

        Ok(ArticleDraft {
            title,
            author: candidate.author.or_else(|| meta.author.clone()),
            published_at: meta.published_at,
            paragraphs,
            strategy: strategy.name().to_string(),
        })
    }
}

/// Distinct false-positive signatures present in the raw blocks.
fn signatures_in(blocks: &[String]) -> Vec<String> {
    let text = blocks.iter().map(|b| b.to_lowercase()).join(" ");
    FALSE_POSITIVE_SIGNATURES
        .iter()
        .filter(|sig| text.contains(*sig))
        .map(ToString::to_string)
        .collect()
}

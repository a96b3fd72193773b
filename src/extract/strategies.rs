//! Extraction strategies.
//!
//! Each strategy is a pure function from a parsed document to an optional
//! [`Candidate`]. Strategies never look at the source domain: a site is
//! supported by adding a [`SiteProfile`] to [`SITE_PROFILES`], and the
//! domain only decides which strategies are tried first.
//!
//! | Strategy | Looks for |
//! |----------|-----------|
//! | `site:<name>` | a publisher's known body, headline, and byline selectors |
//! | `json-ld` | an `articleBody` in embedded JSON-LD |
//! | `article-container` | common article wrappers (`article`, `.story-body`, `main`...) |
//! | `largest-block` | the element with the most direct paragraph text |

use super::metadata::{clean_author, extract_authors, json_ld_articles};
use super::normalize::{element_text, in_chrome, visible_text_blocks};
use crate::utils::domain_matches;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;

/// Raw output of one strategy, before normalization and plausibility checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    /// In-body headline, if the strategy found one.
    pub title: Option<String>,
    /// In-body byline, if the strategy found one.
    pub author: Option<String>,
    /// Text blocks in document order.
    pub blocks: Vec<String>,
}

/// Selector set for one publisher's article template.
#[derive(Debug)]
pub struct SiteProfile {
    pub name: &'static str,
    pub domains: &'static [&'static str],
    pub body: &'static str,
    pub title: &'static str,
    pub author: &'static str,
}

pub static SITE_PROFILES: &[SiteProfile] = &[
    SiteProfile {
        name: "wsj",
        domains: &["wsj.com"],
        body: "section[subscriptions-section='content'], div.article-content, \
               [data-module-zone='article-body']",
        title: "h1.wsj-article-headline, h1[class*='Headline']",
        author: ".author-name, [class*='AuthorLink'], .byline",
    },
    SiteProfile {
        name: "nytimes",
        domains: &["nytimes.com"],
        body: "section[name='articleBody']",
        title: "h1[data-testid='headline']",
        author: "[itemprop='author'] [itemprop='name'], .last-byline",
    },
    SiteProfile {
        name: "ft",
        domains: &["ft.com"],
        body: "#article-body, .article__content-body",
        title: "h1.o-topper__headline, .topper__headline",
        author: "a.n-content-tag--author, .article-info__byline",
    },
    SiteProfile {
        name: "bloomberg",
        domains: &["bloomberg.com"],
        body: "[class*='body-content'], .body-copy-v2",
        title: "h1[class*='headline']",
        author: "[class*='author'] a, .author",
    },
    SiteProfile {
        name: "washingtonpost",
        domains: &["washingtonpost.com"],
        body: ".article-body, [data-qa='article-body']",
        title: "h1[data-qa='headline'], h1#main-content",
        author: "[data-qa='author-name']",
    },
    SiteProfile {
        name: "economist",
        domains: &["economist.com"],
        body: "[data-component='article-body'], .article__body-text",
        title: "h1[data-component='headline'], .article__headline",
        author: "[data-component='byline']",
    },
    SiteProfile {
        name: "reuters",
        domains: &["reuters.com"],
        body: "[data-testid='ArticleBody'], .article-body__content",
        title: "h1[data-testid='Heading']",
        author: "[data-testid='AuthorByline'] a",
    },
    SiteProfile {
        name: "cnn-lite",
        domains: &["lite.cnn.com"],
        body: ".article--lite",
        title: ".headline--lite",
        author: ".byline--lite",
    },
];

/// Generic article wrappers, most specific first.
const CONTAINERS: &[&str] = &[
    "article",
    "main article",
    "[role='article']",
    ".article-body",
    ".article-content",
    ".story-body",
    ".post-content",
    "main",
];

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static IN_BODY_TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, [itemprop='headline'], .article-title").unwrap()
});
static IN_BODY_AUTHOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[itemprop='author'], .byline, .author, [rel='author']").unwrap()
});
static BLOCK_ELEMENTS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div, section, main, article, body").unwrap());

/// A compiled strategy in the chain.
#[derive(Debug, Clone)]
pub enum Strategy {
    Site(CompiledProfile),
    JsonLd,
    ArticleContainer,
    LargestBlock,
}

#[derive(Debug, Clone)]
pub struct CompiledProfile {
    name: String,
    domains: &'static [&'static str],
    body: Selector,
    title: Selector,
    author: Selector,
}

impl CompiledProfile {
    fn compile(profile: &SiteProfile) -> Option<Self> {
        Some(Self {
            name: format!("site:{}", profile.name),
            domains: profile.domains,
            body: Selector::parse(profile.body).ok()?,
            title: Selector::parse(profile.title).ok()?,
            author: Selector::parse(profile.author).ok()?,
        })
    }
}

impl Strategy {
    /// The default chain: every site profile, then the generic heuristics.
    pub fn default_chain() -> Vec<Strategy> {
        SITE_PROFILES
            .iter()
            .filter_map(CompiledProfile::compile)
            .map(Strategy::Site)
            .chain([
                Strategy::JsonLd,
                Strategy::ArticleContainer,
                Strategy::LargestBlock,
            ])
            .collect()
    }

    pub fn name(&self) -> &str {
        match self {
            Strategy::Site(p) => &p.name,
            Strategy::JsonLd => "json-ld",
            Strategy::ArticleContainer => "article-container",
            Strategy::LargestBlock => "largest-block",
        }
    }

    /// Whether this strategy should be tried early for `domain`.
    pub fn has_affinity(&self, domain: &str) -> bool {
        match self {
            Strategy::Site(p) => p.domains.iter().any(|d| domain_matches(domain, d)),
            _ => false,
        }
    }

    pub fn apply(&self, document: &Html) -> Option<Candidate> {
        let candidate = match self {
            Strategy::Site(p) => site(document, p),
            Strategy::JsonLd => json_ld(document),
            Strategy::ArticleContainer => article_container(document),
            Strategy::LargestBlock => largest_block(document),
        }?;
        (!candidate.blocks.is_empty()).then_some(candidate)
    }
}

fn first_text(scope: ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

fn doc_first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter(|el| !in_chrome(el))
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

/// Paragraph blocks under `containers`, each paragraph once, in document order.
fn paragraph_blocks<'a>(containers: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut blocks = Vec::new();
    for container in containers {
        let paragraphs: Vec<ElementRef> = container.select(&PARAGRAPH).collect();
        if paragraphs.is_empty() {
            if !in_chrome(&container) && seen.insert(container.id()) {
                blocks.extend(visible_text_blocks(&container));
            }
            continue;
        }
        for p in paragraphs {
            if in_chrome(&p) || !seen.insert(p.id()) {
                continue;
            }
            blocks.push(element_text(&p));
        }
    }
    blocks
}

fn site(document: &Html, profile: &CompiledProfile) -> Option<Candidate> {
    let root = document.root_element();
    let blocks = paragraph_blocks(document.select(&profile.body));
    if blocks.is_empty() {
        return None;
    }
    Some(Candidate {
        title: first_text(root, &profile.title),
        author: first_text(root, &profile.author).and_then(|a| clean_author(&a)),
        blocks,
    })
}

fn json_ld(document: &Html) -> Option<Candidate> {
    let ld = json_ld_articles(document);
    let article = ld.iter().find(|v| {
        v.get("articleBody")
            .and_then(Value::as_str)
            .is_some_and(|b| !b.trim().is_empty())
    })?;
    let body = article.get("articleBody").and_then(Value::as_str)?;
    let blocks = body
        .split('\n')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(ToString::to_string)
        .collect();
    Some(Candidate {
        title: article
            .get("headline")
            .and_then(Value::as_str)
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty()),
        author: extract_authors(article).into_iter().next(),
        blocks,
    })
}

fn body_title_and_author(document: &Html, scope: Option<ElementRef>) -> (Option<String>, Option<String>) {
    let title = scope
        .and_then(|s| first_text(s, &IN_BODY_TITLE))
        .or_else(|| doc_first_text(document, &IN_BODY_TITLE));
    let author = doc_first_text(document, &IN_BODY_AUTHOR).and_then(|a| clean_author(&a));
    (title, author)
}

fn article_container(document: &Html) -> Option<Candidate> {
    for raw in CONTAINERS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let Some(container) = document.select(&selector).next() else {
            continue;
        };
        let blocks = paragraph_blocks(std::iter::once(container));
        if blocks.is_empty() {
            continue;
        }
        let (title, author) = body_title_and_author(document, Some(container));
        return Some(Candidate {
            title,
            author,
            blocks,
        });
    }
    None
}

fn direct_paragraphs(el: ElementRef) -> Vec<ElementRef> {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| c.value().name() == "p")
        .collect()
}

fn largest_block(document: &Html) -> Option<Candidate> {
    let mut best: Option<(usize, ElementRef)> = None;
    for el in document.select(&BLOCK_ELEMENTS) {
        if in_chrome(&el) {
            continue;
        }
        let chars: usize = direct_paragraphs(el)
            .iter()
            .map(|p| element_text(p).chars().count())
            .sum();
        // strictly greater keeps the first element in document order on ties
        if chars > 0 && best.is_none_or(|(max, _)| chars > max) {
            best = Some((chars, el));
        }
    }
    let (_, el) = best?;
    let blocks = direct_paragraphs(el)
        .iter()
        .map(element_text)
        .collect();
    let (title, author) = body_title_and_author(document, None);
    Some(Candidate {
        title,
        author,
        blocks,
    })
}

//! Document-level metadata: `<meta>` tags, JSON-LD, and `<title>`.
//!
//! These are the fallbacks used when a strategy finds no in-body title or
//! byline, and the only source of `published_at`.

use crate::utils::collapse_whitespace;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[type='application/ld+json']").unwrap());
static OG_TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[property='og:title'], meta[name='twitter:title']").unwrap()
});
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static META_AUTHOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[name='author'], meta[property='article:author'], meta[name='byl']")
        .unwrap()
});
static META_PUBLISHED: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "meta[property='article:published_time'], meta[name='article:published_time'], \
         meta[itemprop='datePublished'], meta[name='date']",
    )
    .unwrap()
});
static TIME_DATETIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());

/// Metadata read once per document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl DocumentMeta {
    pub fn read(document: &Html) -> Self {
        let ld = json_ld_articles(document);

        let title = meta_content(document, &OG_TITLE)
            .or_else(|| ld.iter().find_map(|v| string_field(v, "headline")))
            .or_else(|| {
                document
                    .select(&TITLE)
                    .next()
                    .map(|t| strip_site_suffix(&t.text().collect::<String>()))
            })
            .filter(|t| !t.is_empty());

        let author = meta_content(document, &META_AUTHOR)
            .or_else(|| ld.iter().flat_map(extract_authors).next())
            .and_then(|a| clean_author(&a));

        let published_at = meta_content(document, &META_PUBLISHED)
            .and_then(|d| parse_date(&d))
            .or_else(|| {
                ld.iter()
                    .filter_map(|v| string_field(v, "datePublished"))
                    .find_map(|d| parse_date(&d))
            })
            .or_else(|| {
                document
                    .select(&TIME_DATETIME)
                    .filter_map(|t| t.value().attr("datetime"))
                    .find_map(parse_date)
            });

        Self {
            title,
            author,
            published_at,
        }
    }
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|m| m.value().attr("content"))
        .map(collapse_whitespace)
        .find(|c| !c.is_empty())
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

/// Every JSON-LD object in the document, with arrays and `@graph` flattened.
pub fn json_ld_articles(document: &Html) -> Vec<Value> {
    fn flatten(value: Value, out: &mut Vec<Value>) {
        match value {
            Value::Array(items) => items.into_iter().for_each(|v| flatten(v, out)),
            Value::Object(mut obj) => {
                if let Some(graph) = obj.remove("@graph") {
                    flatten(graph, out);
                }
                out.push(Value::Object(obj));
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
            flatten(value, &mut out);
        }
    }
    out
}

/// Author names from a JSON-LD object's `author` field.
pub fn extract_authors(value: &Value) -> Vec<String> {
    let mut authors = Vec::new();
    match value.get("author") {
        Some(Value::Array(arr)) => {
            for author in arr {
                match author {
                    Value::String(s) => authors.push(s.trim().to_string()),
                    other => {
                        if let Some(name) = other.get("name").and_then(Value::as_str) {
                            authors.push(name.trim().to_string());
                        }
                    }
                }
            }
        }
        Some(Value::Object(obj)) => {
            if let Some(name) = obj.get("name").and_then(Value::as_str) {
                authors.push(name.trim().to_string());
            }
        }
        Some(Value::String(s)) => authors.push(s.trim().to_string()),
        _ => {}
    }
    authors.retain(|a| !a.is_empty());
    authors
}

/// Strip a leading "By", cut at the first `,` or `|`, collapse whitespace.
pub fn clean_author(raw: &str) -> Option<String> {
    let text = collapse_whitespace(raw);
    let text = match text.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("by ") => &text[3..],
        _ => text.as_str(),
    };
    let text = text
        .split([',', '|'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

/// Drop a trailing " | Site" or " - Site" from a `<title>`.
fn strip_site_suffix(raw: &str) -> String {
    let title = collapse_whitespace(raw);
    for sep in [" | ", " - "] {
        if let Some((head, _)) = title.rsplit_once(sep) {
            if !head.trim().is_empty() {
                return head.trim().to_string();
            }
        }
    }
    title
}

/// Parse the date shapes publishers actually emit, normalized to UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
        }
    }
    None
}

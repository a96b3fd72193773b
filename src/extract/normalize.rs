//! Paragraph normalization and boilerplate stripping.

use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use scraper::node::Element;

/// Blocks shorter than this are navigation fragments, not prose.
pub const MIN_PARAGRAPH_CHARS: usize = 20;

/// Substring patterns only strip blocks up to this length; a long paragraph
/// that merely mentions "subscribe" is kept.
const SHORT_BLOCK_CHARS: usize = 160;

/// Whole-block patterns: bylines, share buttons, ad markers.
static LINE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^by\s+[^.!?]{1,80}$",
        r"(?i)^(share|share this( article| story)?|share on \w+|copy link|print|email|comments?)$",
        r"(?i)^(facebook|twitter|x|linkedin|whatsapp|reddit)$",
        r"(?i)^(advertisement|sponsored( content)?|ad|story continues below advertisement)$",
        r"(?i)^(updated|published)\s.{0,60}$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SUBSTRING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bsign up\b",
        r"(?i)\bsubscribe\b",
        r"(?i)\bnewsletter\b",
        r"(?i)\bread next\b",
        r"(?i)\bsuggested topics\b",
        r"(?i)\bpurchase licensing\b",
        r"(?i)\bour standards\b",
        r"(?i)\btrust principles\b",
        r"(?i)\bget a daily digest\b",
        r"(?i)\bshare this article\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Elements whose text never belongs to the article body.
const CHROME_TAGS: &[&str] = &[
    "nav", "footer", "aside", "script", "style", "noscript", "form", "button", "figcaption",
];

/// Denylist of boilerplate patterns, built-ins plus configured extras.
#[derive(Debug, Clone)]
pub struct Boilerplate {
    extra: Vec<Regex>,
}

impl Boilerplate {
    /// `extra` patterns are validated when the config is loaded; any that
    /// still fail to compile are skipped.
    pub fn new(extra: &[String]) -> Self {
        Self {
            extra: extra.iter().filter_map(|p| Regex::new(p).ok()).collect(),
        }
    }

    pub fn is_boilerplate(&self, block: &str) -> bool {
        if LINE_PATTERNS.iter().any(|re| re.is_match(block)) {
            return true;
        }
        if block.chars().count() <= SHORT_BLOCK_CHARS
            && SUBSTRING_PATTERNS.iter().any(|re| re.is_match(block))
        {
            return true;
        }
        self.extra.iter().any(|re| re.is_match(block))
    }

    /// Collapse whitespace, drop fragments and boilerplate, keep order.
    pub fn paragraphs<I, S>(&self, blocks: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        blocks
            .into_iter()
            .map(|b| collapse_whitespace(b.as_ref()))
            .filter(|b| b.chars().count() >= MIN_PARAGRAPH_CHARS)
            .filter(|b| !self.is_boilerplate(b))
            .collect()
    }
}

impl Default for Boilerplate {
    fn default() -> Self {
        Self::new(&[])
    }
}

fn is_chrome(e: &Element) -> bool {
    CHROME_TAGS.contains(&e.name())
}

/// True when `el` sits inside page chrome (navigation, footer, scripts...).
pub fn in_chrome(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(|n| n.value().as_element())
        .any(is_chrome)
}

/// Text nodes under `el` that are not inside chrome, trimmed, in document
/// order. Script and style bodies never appear here.
pub fn visible_text_blocks(el: &ElementRef) -> Vec<String> {
    el.descendants()
        .filter(|n| {
            !n.ancestors()
                .filter_map(|a| a.value().as_element())
                .any(is_chrome)
        })
        .filter_map(|n| n.value().as_text())
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Visible text of an element as one string.
pub fn element_text(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

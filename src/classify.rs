//! Paywall classification heuristic.
//!
//! Rules, applied in order:
//!
//! 1. the source domain suffix-matches a denylisted publisher: paywalled,
//!    whatever the content length
//! 2. the extracted text is shorter than `min_chars`: paywalled, since short
//!    content usually means access was blocked
//! 3. otherwise: open
//!
//! This is a heuristic, not ground truth. A genuinely short open article is a
//! false positive, and a paywalled publisher missing from the denylist is a
//! false negative. Both are fixed by editing `paywall.denylist` /
//! `paywall.min_chars` in the config. A denylisted publisher that also runs
//! open sections is always classified paywalled; that is a known
//! false-positive source and is left as is.
//!
//! The classifier is total: every input yields a boolean.

use crate::config::PaywallConfig;
use crate::utils::domain_matches;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PaywallClassifier {
    denylist: Vec<String>,
    min_chars: usize,
}

impl PaywallClassifier {
    pub fn new(config: &PaywallConfig) -> Self {
        Self {
            denylist: config.denylist.iter().map(|d| d.to_lowercase()).collect(),
            min_chars: config.min_chars,
        }
    }

    /// The denylist entry matching `source_domain`, if any.
    pub fn denylisted(&self, source_domain: &str) -> Option<&str> {
        let domain = source_domain.trim().trim_end_matches('.').to_lowercase();
        let domain = domain.strip_prefix("www.").unwrap_or(&domain);
        self.denylist
            .iter()
            .find(|entry| domain_matches(domain, entry))
            .map(String::as_str)
    }

    pub fn classify(&self, source_domain: &str, extracted_char_count: usize) -> bool {
        if let Some(entry) = self.denylisted(source_domain) {
            debug!(domain = %source_domain, %entry, "Denylisted publisher");
            return true;
        }
        let short = extracted_char_count < self.min_chars;
        debug!(
            domain = %source_domain,
            chars = extracted_char_count,
            min = self.min_chars,
            paywalled = short,
            "Classified by content length"
        );
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PaywallClassifier {
        PaywallClassifier::new(&PaywallConfig::default())
    }

    #[test]
    fn test_denylisted_domains_always_paywalled() {
        let c = classifier();
        for domain in ["wsj.com", "www.nytimes.com", "markets.FT.com", "BLOOMBERG.COM"] {
            for len in [0, 50, 199, 200, 5000, usize::MAX] {
                assert!(c.classify(domain, len), "{domain} at {len}");
            }
        }
    }

    #[test]
    fn test_other_domains_follow_length_threshold() {
        let c = classifier();
        for domain in ["example.com", "reuters.com", "microsoft.com", "notwsj.com", ""] {
            for len in [0, 1, 50, 199, 200, 201, 5000] {
                assert_eq!(c.classify(domain, len), len < 200, "{domain} at {len}");
            }
        }
    }

    #[test]
    fn test_scenario_a_wsj_long_content() {
        assert!(classifier().classify("wsj.com", 5000));
    }

    #[test]
    fn test_scenario_b_short_open_domain() {
        assert!(classifier().classify("example.com", 50));
    }

    #[test]
    fn test_denylist_edit_corrects_classification() {
        let config = PaywallConfig {
            denylist: vec!["barrons.com".to_string()],
            min_chars: 200,
        };
        let c = PaywallClassifier::new(&config);
        assert!(c.classify("barrons.com", 10_000));
        assert!(!c.classify("wsj.com", 10_000));
        assert_eq!(c.denylisted("www.barrons.com"), Some("barrons.com"));
    }
}

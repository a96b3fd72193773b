//! YAML configuration for the pipeline.
//!
//! Every field carries a serde default, so an empty or partial file is valid
//! and the binary runs without any file at all. The paywall denylist lives
//! here on purpose: misclassified publishers are corrected by editing the
//! file, not the code.
//!
//! ```yaml
//! paywall:
//!   denylist: [wsj.com, nytimes.com, ft.com]
//!   min_chars: 200
//! browser:
//!   cookie_header: "session=..."
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub paywall: PaywallConfig,
    pub extraction: ExtractionConfig,
    pub browser: BrowserConfig,
    pub tagging: TaggingConfig,
    /// Publisher display names keyed by bare domain.
    pub publishers: BTreeMap<String, String>,
    /// Query keys dropped when computing article ids. A trailing `*` matches by prefix.
    pub tracking_params: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub dataset: PathBuf,
    pub content_dir: PathBuf,
    pub session: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("data/news.json"),
            content_dir: PathBuf::from("data/news"),
            session: PathBuf::from("data/session.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaywallConfig {
    /// Publishers treated as paywalled regardless of content length (suffix match).
    pub denylist: Vec<String>,
    /// Extracted text shorter than this is taken as a sign of blocked access.
    pub min_chars: usize,
}

impl Default for PaywallConfig {
    fn default() -> Self {
        Self {
            denylist: [
                "wsj.com",
                "nytimes.com",
                "ft.com",
                "bloomberg.com",
                "washingtonpost.com",
                "economist.com",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            min_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Plausibility floor for combined paragraph text.
    pub min_chars: usize,
    pub timeout_secs: u64,
    /// Extra boilerplate regexes appended to the built-in denylist.
    pub boilerplate: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_chars: 40,
            timeout_secs: 30,
            boilerplate: Vec::new(),
        }
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub user_agent: String,
    /// Cookie header exported from the logged-in browser profile.
    pub cookie_header: Option<String>,
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            cookie_header: None,
            max_retries: 2,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TaggingConfig {
    pub keywords: BTreeMap<String, Vec<String>>,
    pub max_tags: usize,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        let mut keywords = BTreeMap::new();
        let mut add = |tag: &str, kws: &[&str]| {
            keywords.insert(
                tag.to_string(),
                kws.iter().map(ToString::to_string).collect(),
            );
        };
        add(
            "Interest Rates",
            &["interest rate", "rate cut", "rate hike", "fed funds", "basis point"],
        );
        add(
            "Inflation",
            &["inflation", "cpi", "pce", "price stability", "disinflation"],
        );
        add(
            "Employment",
            &["employment", "jobs", "unemployment", "labor market", "payroll"],
        );
        add("Powell", &["powell", "fed chair"]);
        add("FOMC", &["fomc", "federal open market"]);
        add("QT", &["quantitative tightening", "balance sheet"]);
        add("Banking", &["banking", "regional bank"]);
        add("Markets", &["stock", "bond", "treasury", "yield"]);
        Self {
            keywords,
            max_tags: 5,
        }
    }
}

fn default_tracking_params() -> Vec<String> {
    [
        "utm_*", "fbclid", "gclid", "mc_cid", "mc_eid", "smid", "cmpid", "ref", "mod", "st",
        "guccounter",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_publishers() -> BTreeMap<String, String> {
    [
        ("wsj.com", "The Wall Street Journal"),
        ("nytimes.com", "The New York Times"),
        ("ft.com", "Financial Times"),
        ("bloomberg.com", "Bloomberg"),
        ("washingtonpost.com", "The Washington Post"),
        ("economist.com", "The Economist"),
        ("reuters.com", "Reuters"),
        ("axios.com", "Axios"),
    ]
    .iter()
    .map(|(d, n)| (d.to_string(), n.to_string()))
    .collect()
}

impl Config {
    /// Built-in defaults with the publisher map and tracking params filled in.
    pub fn builtin() -> Self {
        Self {
            publishers: default_publishers(),
            tracking_params: default_tracking_params(),
            ..Default::default()
        }
    }

    /// Load configuration from `path`, or the built-in defaults when `None`.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No config file given; using built-in defaults");
            return Ok(Self::builtin());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Config = if raw.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        if config.publishers.is_empty() {
            config.publishers = default_publishers();
        }
        if config.tracking_params.is_empty() {
            config.tracking_params = default_tracking_params();
        }
        config.validate()
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        if self.extraction.min_chars == 0 {
            return Err(ConfigError::Invalid(
                "extraction.min_chars must be greater than zero".to_string(),
            ));
        }
        if self.extraction.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "extraction.timeout_secs must be greater than zero".to_string(),
            ));
        }
        for pattern in &self.extraction.boilerplate {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("bad boilerplate pattern {pattern:?}: {e}"))
            })?;
        }
        self.paywall.denylist = self
            .paywall
            .denylist
            .iter()
            .map(|d| {
                let d = d.trim().to_lowercase();
                let d = d.trim_start_matches('.');
                d.strip_prefix("www.").unwrap_or(d).to_string()
            })
            .filter(|d| !d.is_empty())
            .collect();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.paywall.min_chars, 200);
        assert_eq!(config.extraction.min_chars, 40);
        assert!(config.paywall.denylist.contains(&"wsj.com".to_string()));
        assert_eq!(
            config.publishers.get("ft.com").map(String::as_str),
            Some("Financial Times")
        );
        assert!(config.tracking_params.contains(&"utm_*".to_string()));
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
paywall:
  denylist: ["WWW.Barrons.com", ".ft.com"]
browser:
  cookie_header: "sid=abc"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.paywall.denylist, vec!["barrons.com", "ft.com"]);
        assert_eq!(config.paywall.min_chars, 200);
        assert_eq!(config.browser.cookie_header.as_deref(), Some("sid=abc"));
        assert_eq!(config.browser.max_retries, 2);
    }

    #[test]
    fn test_rejects_zero_extraction_threshold() {
        let yaml = "extraction:\n  min_chars: 0\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_bad_boilerplate_regex() {
        let yaml = "extraction:\n  boilerplate: [\"(unclosed\"]\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load(Some(Path::new("/nonexistent/paywall_news.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

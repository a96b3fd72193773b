//! Command-line interface definitions for Paywall News.
//!
//! Data paths can come from flags, environment variables, or the config
//! file, in that order of precedence.

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ingest paywalled news and render it according to the viewer's session.
///
/// # Examples
///
/// ```sh
/// # Ingest two articles through the authenticated browser cookies
/// paywall_news -c config.yaml ingest https://www.wsj.com/articles/x https://example.com/y
///
/// # Ingest a page saved from a logged-in browser
/// paywall_news ingest https://www.ft.com/content/abc --markup-file page.html
///
/// # Show an article as the current viewer would see it
/// paywall_news render news_1a2b3c4d5e6f7a8b
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, env = "PAYWALL_NEWS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Dataset file (overrides `paths.dataset`)
    #[arg(long, env = "PAYWALL_NEWS_DATASET", global = true)]
    pub dataset: Option<PathBuf>,

    /// Directory for per-article content documents (overrides `paths.content_dir`)
    #[arg(long, env = "PAYWALL_NEWS_CONTENT_DIR", global = true)]
    pub content_dir: Option<PathBuf>,

    /// Session file (overrides `paths.session`)
    #[arg(long, env = "PAYWALL_NEWS_SESSION", global = true)]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch, extract, classify and store articles
    Ingest {
        /// Article URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Read markup from this file instead of fetching
        #[arg(long)]
        markup_file: Option<PathBuf>,

        /// Number of workers, each with its own page source
        #[arg(short, long, default_value_t = 1)]
        workers: usize,
    },

    /// Re-run paywall classification on a stored article
    Classify {
        /// Article id or source URL
        key: String,

        /// Report the result without saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show an article as the current session may see it
    Render {
        /// Article id or source URL
        key: String,

        #[arg(long)]
        json: bool,
    },

    /// Print the public listing
    List {
        #[arg(long)]
        json: bool,
    },

    /// Add or remove tags on a stored article
    Tag {
        /// Article id or source URL
        key: String,

        #[arg(long = "add", value_name = "TAG")]
        add: Vec<String>,

        #[arg(long = "remove", value_name = "TAG")]
        remove: Vec<String>,
    },

    /// Inspect or change the local viewer session
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    /// Print the current session, if any
    Show,

    /// Store a session token issued by the login flow
    Save {
        #[arg(long)]
        email: String,

        #[arg(long)]
        display_name: Option<String>,

        /// `member` or `free`; anything else is treated as `free`
        #[arg(long, default_value = "free")]
        role: String,

        #[arg(long, env = "PAYWALL_NEWS_TOKEN")]
        token: String,

        /// Session lifetime in hours
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },

    /// Remove the stored session
    Clear,
}

impl Cli {
    /// Apply path overrides from flags and environment to `config`.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(dataset) = &self.dataset {
            config.paths.dataset = dataset.clone();
        }
        if let Some(content_dir) = &self.content_dir {
            config.paths.content_dir = content_dir.clone();
        }
        if let Some(session) = &self.session_file {
            config.paths.session = session.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_parsing() {
        let cli = Cli::parse_from([
            "paywall_news",
            "ingest",
            "https://a.example.com/1",
            "https://b.example.com/2",
            "--workers",
            "2",
        ]);
        assert_eq!(
            cli.command,
            Command::Ingest {
                urls: vec![
                    "https://a.example.com/1".to_string(),
                    "https://b.example.com/2".to_string()
                ],
                markup_file: None,
                workers: 2,
            }
        );
    }

    #[test]
    fn test_ingest_requires_a_url() {
        assert!(Cli::try_parse_from(["paywall_news", "ingest"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "paywall_news",
            "list",
            "--json",
            "-c",
            "/tmp/config.yaml",
            "--dataset",
            "/tmp/news.json",
        ]);
        assert_eq!(cli.command, Command::List { json: true });
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.yaml")));

        let mut config = Config::builtin();
        cli.apply_overrides(&mut config);
        assert_eq!(config.paths.dataset, PathBuf::from("/tmp/news.json"));
        assert_eq!(config.paths.content_dir, PathBuf::from("data/news"));
    }

    #[test]
    fn test_tag_repeats() {
        let cli = Cli::parse_from([
            "paywall_news",
            "tag",
            "news_0011223344556677",
            "--add",
            "Fed",
            "--add",
            "Rates",
            "--remove",
            "Markets",
        ]);
        let Command::Tag { key, add, remove } = cli.command else {
            panic!("expected tag command");
        };
        assert_eq!(key, "news_0011223344556677");
        assert_eq!(add, vec!["Fed".to_string(), "Rates".to_string()]);
        assert_eq!(remove, vec!["Markets".to_string()]);
    }

    #[test]
    fn test_session_save() {
        let cli = Cli::parse_from([
            "paywall_news",
            "session",
            "save",
            "--email",
            "reader@example.com",
            "--role",
            "member",
            "--token",
            "opaque",
        ]);
        let Command::Session {
            action: SessionCommand::Save { role, ttl_hours, .. },
        } = cli.command
        else {
            panic!("expected session save");
        };
        assert_eq!(role, "member");
        assert_eq!(ttl_hours, 24);
    }
}

//! # Paywall News
//!
//! Ingests paywalled news articles through an authenticated browser
//! session, extracts their content despite heterogeneous markup, flags
//! paywalled ones, merges them into a local dataset without duplicates, and
//! gates full content behind the viewer's session role.
//!
//! ## Usage
//!
//! ```sh
//! paywall_news ingest https://www.wsj.com/articles/fed-holds-rates
//! paywall_news list
//! paywall_news session save --email me@example.com --role member --token "$TOKEN"
//! paywall_news render news_1a2b3c4d5e6f7a8b
//! ```
//!
//! ## Architecture
//!
//! Two halves share only the [`models::Article`] schema:
//! 1. **Ingestion**: page source → extractor → classifier → store commit,
//!    once per article, failures isolated to that article
//! 2. **Rendering**: session store → access gate, per view, no locking

use chrono::Utc;
use clap::Parser;
use std::collections::BTreeSet;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod classify;
mod cli;
mod config;
mod error;
mod extract;
mod gate;
mod ingest;
mod models;
mod session;
mod store;
mod tagging;
mod utils;

use browser::{FilePageSource, HttpPageSource, PageSource, RetryFetch};
use classify::PaywallClassifier;
use cli::{Cli, Command, SessionCommand};
use config::Config;
use error::{AppError, StoreError};
use gate::{AccessGate, Badge, RenderedArticle};
use ingest::Ingestor;
use models::{ArticleUpdate, Role};
use session::SessionStore;
use store::ArticleStore;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args.command, "Parsed CLI arguments");

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            e.exit_code()
        }
    };

    let elapsed = start_time.elapsed();
    info!(?elapsed, exit_code = code, "Execution complete");
    ExitCode::from(code)
}

async fn run(args: Cli) -> Result<u8, AppError> {
    let mut config = Config::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    let store = ArticleStore::new(&config.paths, config.tracking_params.clone());
    let sessions = SessionStore::new(config.paths.session.clone());

    match args.command {
        Command::Ingest {
            urls,
            markup_file,
            workers,
        } => ingest_urls(&config, &store, &urls, markup_file, workers).await,
        Command::Classify { key, dry_run } => {
            reclassify(&config, &store, &key, dry_run).await?;
            Ok(0)
        }
        Command::Render { key, json } => {
            render(&store, &sessions, &key, json).await?;
            Ok(0)
        }
        Command::List { json } => {
            list(&store, json).await?;
            Ok(0)
        }
        Command::Tag { key, add, remove } => {
            tag(&store, &key, add, remove).await?;
            Ok(0)
        }
        Command::Session { action } => {
            manage_session(&sessions, action).await?;
            Ok(0)
        }
    }
}

#[instrument(level = "info", skip_all, fields(urls = urls.len(), workers = workers))]
async fn ingest_urls(
    config: &Config,
    store: &ArticleStore,
    urls: &[String],
    markup_file: Option<std::path::PathBuf>,
    workers: usize,
) -> Result<u8, AppError> {
    // Early check: fail before any fetch if the content dir is unusable
    ensure_writable_dir(&config.paths.content_dir).await?;

    let workers = workers.clamp(1, urls.len().max(1));
    let ingestor = Ingestor::new(config, store);

    let code = match markup_file {
        Some(path) => {
            if urls.len() > 1 {
                warn!(path = %path.display(), "One markup file serves every URL in this batch");
            }
            let sources = vec![FilePageSource::new(path); workers];
            run_batch(&ingestor, urls, sources).await
        }
        None => {
            let mut sources = Vec::with_capacity(workers);
            for _ in 0..workers {
                let http = HttpPageSource::new(&config.browser)?;
                sources.push(RetryFetch::from_config(http, &config.browser));
            }
            run_batch(&ingestor, urls, sources).await
        }
    };
    Ok(code)
}

async fn run_batch<S: PageSource>(ingestor: &Ingestor<'_>, urls: &[String], sources: Vec<S>) -> u8 {
    let (report, _) = ingestor.ingest_batch(urls, sources).await;
    for done in &report.ingested {
        println!(
            "{}\t{}\t{}\t{:?}\t{}",
            done.id,
            if done.has_paywall { "paywalled" } else { "open" },
            done.strategy,
            done.outcome,
            done.title
        );
    }
    for (url, e) in &report.failed {
        eprintln!("failed\t{url}\t{e}");
    }
    report.exit_code()
}

async fn reclassify(
    config: &Config,
    store: &ArticleStore,
    key: &str,
    dry_run: bool,
) -> Result<(), AppError> {
    let article = store.find(key).await?;
    let chars = match article.content_path {
        Some(_) => match store.load_content(&article).await {
            Ok(document) => document.char_count(),
            Err(e) => {
                warn!(id = %article.id, error = %e, "Content unavailable; classifying as empty");
                0
            }
        },
        None => 0,
    };
    let domain = article.source_domain().unwrap_or_default();
    let has_paywall = PaywallClassifier::new(&config.paywall).classify(&domain, chars);

    println!(
        "{}\t{}\t{} chars\t{} -> {}",
        article.id, domain, chars, article.has_paywall, has_paywall
    );
    if dry_run || has_paywall == article.has_paywall {
        return Ok(());
    }

    let update = ArticleUpdate {
        has_paywall: Some(has_paywall),
        ..ArticleUpdate::for_url(article.source_url.clone())
    };
    store.commit(update, None).await?;
    info!(id = %article.id, has_paywall, "Reclassified article");
    Ok(())
}

async fn render(
    store: &ArticleStore,
    sessions: &SessionStore,
    key: &str,
    json: bool,
) -> Result<(), AppError> {
    let now = Utc::now();
    let article = store.find(key).await?;
    let session = sessions.load(now).await?;
    let rendered = AccessGate::new(store)
        .render(&article, session.as_ref(), now)
        .await;

    if json {
        let out = serde_json::to_string_pretty(&rendered).map_err(StoreError::from)?;
        println!("{out}");
        return Ok(());
    }

    let badge = match rendered.badge() {
        Badge::MemberOnly => "  [MEMBER ONLY]",
        Badge::None => "",
    };
    match &rendered {
        RenderedArticle::Full {
            title,
            source,
            author,
            paragraphs,
            ..
        } => {
            println!("{title}");
            match author {
                Some(author) => println!("{source} | {author}{badge}"),
                None => println!("{source}{badge}"),
            }
            for paragraph in paragraphs {
                println!("\n{paragraph}");
            }
        }
        RenderedArticle::Summary {
            title,
            source,
            source_url,
            summary,
            ..
        } => {
            println!("{title}");
            println!("{source}{badge}");
            println!("\n{summary}");
            println!("\nRead the full article at {source_url}");
        }
    }
    Ok(())
}

async fn list(store: &ArticleStore, json: bool) -> Result<(), AppError> {
    let dataset = store.snapshot().await?;
    let listing: Vec<_> = dataset.articles().iter().map(|a| a.to_listing()).collect();

    if json {
        let out = serde_json::to_string_pretty(&listing).map_err(StoreError::from)?;
        println!("{out}");
        return Ok(());
    }
    for entry in &listing {
        let date = entry.published_at.unwrap_or(entry.scraped_at);
        let tags = entry.tags.iter().cloned().collect::<Vec<_>>().join(", ");
        println!(
            "{}  {}  {}  {}: {}  [{}]",
            entry.id,
            date.format("%Y-%m-%d"),
            if entry.has_paywall { "member" } else { "open  " },
            entry.source,
            entry.title,
            tags
        );
    }
    Ok(())
}

async fn tag(
    store: &ArticleStore,
    key: &str,
    add: Vec<String>,
    remove: Vec<String>,
) -> Result<(), AppError> {
    let article = store.find(key).await?;
    let remove: BTreeSet<String> = remove.into_iter().map(|t| t.trim().to_string()).collect();
    let tags: BTreeSet<String> = article
        .tags
        .iter()
        .cloned()
        .chain(add.into_iter().map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty() && !remove.contains(t))
        .collect();

    let update = ArticleUpdate {
        tags: Some(tags.clone()),
        ..ArticleUpdate::for_url(article.source_url.clone())
    };
    store.commit(update, None).await?;
    println!(
        "{}\t{}",
        article.id,
        tags.into_iter().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

async fn manage_session(sessions: &SessionStore, action: SessionCommand) -> Result<(), AppError> {
    let now = Utc::now();
    match action {
        SessionCommand::Show => match sessions.load(now).await? {
            Some(s) => println!(
                "{} <{}>\trole={:?}\texpires={}",
                s.display_name,
                s.email,
                s.role,
                s.expires_at.to_rfc3339()
            ),
            None => println!("No active session ({})", sessions.path().display()),
        },
        SessionCommand::Save {
            email,
            display_name,
            role,
            token,
            ttl_hours,
        } => {
            if token.trim().is_empty() {
                return Err(AppError::Session("token must not be empty".to_string()));
            }
            if ttl_hours <= 0 {
                return Err(AppError::Session(format!(
                    "ttl must be positive, got {ttl_hours} hours"
                )));
            }
            let display_name = display_name
                .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());
            let role = Role::from(role.as_str());
            let issued = session::issue(
                &email,
                &display_name,
                role,
                &token,
                now,
                chrono::Duration::hours(ttl_hours),
            );
            sessions.save(&issued).await?;
            println!("Saved {:?} session for {}", role, email);
        }
        SessionCommand::Clear => {
            sessions.clear().await?;
            println!("Session cleared");
        }
    }
    Ok(())
}

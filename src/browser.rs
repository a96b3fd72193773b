//! Page sources: where rendered article markup comes from.
//!
//! The pipeline only ever sees a [`PageSource`]. A source is exclusively
//! owned by one ingestion worker (`fetch` takes `&mut self`), so a browser
//! session is never navigated concurrently. Implementations:
//!
//! - [`HttpPageSource`]: requests carrying the cookies and user agent of an
//!   authenticated browser profile
//! - [`FilePageSource`]: markup saved to disk by an external browser
//! - [`RetryFetch`]: decorator adding exponential backoff with jitter
//!
//! Callers bound every fetch with [`fetch_with_timeout`]; a timeout is an
//! [`ExtractionFailure`], never a crash, and leaves nothing behind.

use crate::config::BrowserConfig;
use crate::error::{ConfigError, ExtractionFailure};
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// URL after redirects.
    pub url: String,
    pub markup: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying: connection trouble, rate limiting, server errors.
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Fatal(String),
}

/// Something that can produce the rendered markup for an article URL.
///
/// Implementations hold exclusive state (a browser tab, a cookie jar), so
/// `fetch` takes `&mut self` and one source serves one worker at a time.
///
/// # Errors
///
/// [`FetchError::Transient`] for failures worth retrying and
/// [`FetchError::Fatal`] for the rest. [`RetryFetch`] relies on the split.
pub trait PageSource {
    async fn fetch(&mut self, url: &str) -> Result<RenderedPage, FetchError>;
}

/// Fetch `url`, giving up after `limit`.
///
/// Dropping the in-flight fetch on timeout is safe: sources have no side
/// effects beyond the request itself.
///
/// # Arguments
///
/// * `source` - The worker's page source
/// * `url` - Article URL to load
/// * `limit` - Upper bound on the whole fetch, retries included
///
/// # Returns
///
/// The rendered page, or an [`ExtractionFailure`]:
/// - `Timeout` when `limit` elapsed first (exit code 3)
/// - `Navigation` when the source reported an error (exit code 5)
///
/// # Examples
///
/// ```ignore
/// let mut source = FilePageSource::new("saved/article.html");
/// let page = fetch_with_timeout(&mut source, url, Duration::from_secs(30)).await?;
/// ```
#[instrument(level = "info", skip(source, limit))]
pub async fn fetch_with_timeout<S: PageSource>(
    source: &mut S,
    url: &str,
    limit: StdDuration,
) -> Result<RenderedPage, ExtractionFailure> {
    let t0 = Instant::now();
    match timeout(limit, source.fetch(url)).await {
        Ok(Ok(page)) => {
            debug!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                bytes = page.markup.len(),
                "Fetched page"
            );
            Ok(page)
        }
        Ok(Err(e)) => Err(ExtractionFailure::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => {
            warn!(?limit, "Page load timed out");
            Err(ExtractionFailure::Timeout {
                url: url.to_string(),
                after: limit,
            })
        }
    }
}

/// Fetches pages over HTTP using an exported browser cookie header.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    /// Build a client carrying the configured user agent and cookie header.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when the cookie header is not a valid
    /// header value, or the client cannot be built.
    pub fn new(config: &BrowserConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        if let Some(cookie) = config.cookie_header.as_deref().filter(|c| !c.is_empty()) {
            let mut value = HeaderValue::from_str(cookie)
                .map_err(|e| ConfigError::Invalid(format!("browser.cookie_header: {e}")))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl PageSource for HttpPageSource {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&mut self, url: &str) -> Result<RenderedPage, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() || e.is_request() {
                FetchError::Transient(e.to_string())
            } else {
                FetchError::Fatal(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(FetchError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Fatal(format!("HTTP {status}")));
        }

        let final_url = response.url().to_string();
        let markup = response
            .text()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        Ok(RenderedPage {
            url: final_url,
            markup,
        })
    }
}

/// Serves markup saved to disk, whatever URL is asked for.
#[derive(Debug, Clone)]
pub struct FilePageSource {
    path: PathBuf,
}

impl FilePageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PageSource for FilePageSource {
    async fn fetch(&mut self, url: &str) -> Result<RenderedPage, FetchError> {
        let markup = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FetchError::Fatal(format!("{}: {e}", self.path.display())))?;
        Ok(RenderedPage {
            url: url.to_string(),
            markup,
        })
    }
}

/// Adds exponential backoff retry to any [`PageSource`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// Only [`FetchError::Transient`] failures are retried.
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T: PageSource> RetryFetch<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    pub fn from_config(inner: T, config: &BrowserConfig) -> Self {
        Self::new(
            inner,
            config.max_retries,
            StdDuration::from_millis(config.base_delay_ms),
        )
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt - 1).min(16) as u32;
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: PageSource> PageSource for RetryFetch<T> {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&mut self, url: &str) -> Result<RenderedPage, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(page) => {
                    if attempt > 0 {
                        info!(attempt, "Fetch succeeded after retry");
                    }
                    return Ok(page);
                }
                Err(e @ FetchError::Fatal(_)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Canned responses keyed by URL, with an optional artificial delay.
    #[derive(Debug, Default)]
    pub struct ScriptedPages {
        pages: HashMap<String, Vec<Result<String, FetchError>>>,
        pub delay: Option<StdDuration>,
        pub calls: Vec<String>,
    }

    impl ScriptedPages {
        pub fn page(mut self, url: &str, markup: &str) -> Self {
            self.pages
                .entry(url.to_string())
                .or_default()
                .push(Ok(markup.to_string()));
            self
        }

        pub fn failure(mut self, url: &str, error: FetchError) -> Self {
            self.pages.entry(url.to_string()).or_default().push(Err(error));
            self
        }
    }

    impl PageSource for ScriptedPages {
        async fn fetch(&mut self, url: &str) -> Result<RenderedPage, FetchError> {
            self.calls.push(url.to_string());
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            // responses are consumed in order; the last one repeats
            let queue = self
                .pages
                .get_mut(url)
                .ok_or_else(|| FetchError::Fatal(format!("HTTP 404 Not Found for {url}")))?;
            let next = if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue[0].clone()
            };
            next.map(|markup| RenderedPage {
                url: url.to_string(),
                markup,
            })
        }
    }
}

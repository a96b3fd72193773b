//! On-disk article store.
//!
//! Layout:
//!
//! ```text
//! data/
//! ├── news.json          # dataset: every Article, display order
//! └── news/
//!     └── news_<id>.json # ContentDocument per article
//! ```
//!
//! Every write goes through [`ArticleStore::commit`], which holds a lock for
//! the whole read-merge-write sequence. The merge runs before anything is
//! written, so a conflict leaves both files untouched. Both files are staged
//! as temp files first and renamed into place only once both writes
//! succeeded, so readers see either the old or the new version.

pub mod merge;

use crate::config::PathsConfig;
use crate::error::StoreError;
use crate::models::{Article, ArticleUpdate, ContentDocument};
use crate::utils::{StagedFile, stage_file};
use chrono::Utc;
use merge::{Dataset, IdScheme, MergeOutcome, merge};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// What a successful commit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub id: String,
    pub outcome: MergeOutcome,
    pub content_path: Option<String>,
}

#[derive(Debug)]
pub struct ArticleStore {
    dataset_path: PathBuf,
    content_dir: PathBuf,
    ids: IdScheme,
    commit_lock: Mutex<()>,
}

impl ArticleStore {
    pub fn new(paths: &PathsConfig, tracking_params: Vec<String>) -> Self {
        Self {
            dataset_path: paths.dataset.clone(),
            content_dir: paths.content_dir.clone(),
            ids: IdScheme::new(tracking_params),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn ids(&self) -> &IdScheme {
        &self.ids
    }

    pub fn content_path_for(&self, id: &str) -> PathBuf {
        self.content_dir.join(format!("{id}.json"))
    }

    /// Read the current dataset. A missing file is an empty dataset.
    pub async fn snapshot(&self) -> Result<Dataset, StoreError> {
        read_dataset(&self.dataset_path).await
    }

    /// Merge `update` into the dataset and persist it, writing `paragraphs`
    /// as the article's content document when supplied and non-empty.
    ///
    /// # Arguments
    ///
    /// * `update` - Partial record keyed by its source URL
    /// * `paragraphs` - Full text to store next to the dataset, if any
    ///
    /// # Returns
    ///
    /// The article id, whether it was inserted or updated, and where its
    /// content document lives.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`] when another URL already owns the id
    /// - [`StoreError::Io`] or [`StoreError::Serialization`] on write failure;
    ///   neither file is replaced in that case
    #[instrument(level = "info", skip_all, fields(url = %update.source_url))]
    pub async fn commit(
        &self,
        mut update: ArticleUpdate,
        paragraphs: Option<Vec<String>>,
    ) -> Result<CommitReport, StoreError> {
        let _guard = self.commit_lock.lock().await;

        let (_, id) = self.ids.identify(&update.source_url)?;
        let paragraphs = paragraphs.filter(|p| !p.is_empty());
        let content_file = paragraphs.as_ref().map(|_| self.content_path_for(&id));
        if let Some(path) = &content_file {
            update.content_path = Some(path.to_string_lossy().into_owned());
        }

        let current = self.snapshot().await?;
        let merged = merge(&current, &update, &self.ids, Utc::now())?;
        let stored = merged
            .dataset
            .get(&merged.id)
            .ok_or_else(|| StoreError::NotFound(merged.id.clone()))?;

        let dataset = serde_json::to_vec_pretty(&merged.dataset)?;
        let mut staged: Vec<StagedFile> = Vec::with_capacity(2);
        if let (Some(path), Some(paragraphs)) = (&content_file, paragraphs) {
            let document = ContentDocument {
                id: stored.id.clone(),
                title: stored.title.clone(),
                source_url: stored.source_url.clone(),
                paragraphs,
            };
            staged.push(stage_file(path, &serde_json::to_vec_pretty(&document)?).await?);
        }
        match stage_file(&self.dataset_path, &dataset).await {
            Ok(file) => staged.push(file),
            Err(e) => {
                for file in staged {
                    file.discard().await;
                }
                return Err(e);
            }
        }
        // content first: the dataset must never point at a missing document
        for file in staged {
            file.commit().await?;
        }

        info!(
            id = %merged.id,
            outcome = ?merged.outcome,
            articles = merged.dataset.len(),
            "Committed article"
        );
        Ok(CommitReport {
            id: merged.id,
            outcome: merged.outcome,
            content_path: stored.content_path.clone(),
        })
    }

    /// Look up an article by id or by source URL.
    ///
    /// # Arguments
    ///
    /// * `key` - An article id, or any URL that normalizes to a stored one
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when nothing matches, or the read error if
    /// the dataset cannot be loaded.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let a = store.find("https://example.com/story/?utm_source=x").await?;
    /// let b = store.find(&a.id).await?;
    /// assert_eq!(a, b);
    /// ```
    pub async fn find(&self, key: &str) -> Result<Article, StoreError> {
        let dataset = self.snapshot().await?;
        let by_id = dataset.get(key.trim());
        let found = match by_id {
            Some(article) => Some(article),
            None => match self.ids.identify(key) {
                Ok((_, id)) => dataset.get(&id),
                Err(_) => None,
            },
        };
        found
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Load the content document an article points at.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when the article has no `content_path` or the
    /// document belongs to another id. IO and parse failures pass through.
    pub async fn load_content(&self, article: &Article) -> Result<ContentDocument, StoreError> {
        let path = article
            .content_path
            .as_deref()
            .ok_or_else(|| StoreError::NotFound(format!("content for {}", article.id)))?;
        let raw = fs::read(path)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        let document: ContentDocument = serde_json::from_slice(&raw)?;
        if document.id != article.id {
            warn!(expected = %article.id, found = %document.id, %path, "Content document id mismatch");
            return Err(StoreError::NotFound(format!("content for {}", article.id)));
        }
        Ok(document)
    }
}

async fn read_dataset(path: &Path) -> Result<Dataset, StoreError> {
    match fs::read(path).await {
        Ok(raw) => {
            let articles: Vec<Article> = serde_json::from_slice(&raw)?;
            Ok(Dataset::from_articles(articles))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No dataset yet, starting empty");
            Ok(Dataset::default())
        }
        Err(e) => Err(StoreError::io(path.display(), e)),
    }
}

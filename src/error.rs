//! Error taxonomy for the ingestion and access-control pipeline.
//!
//! Errors are scoped to the unit of work that produced them:
//!
//! - [`ExtractionFailure`]: one article could not be turned into a draft. The
//!   batch logs it and moves on.
//! - [`MergeConflict`]: two records hash to the same id but disagree on the
//!   normalized source URL. Reported to the operator, never auto-resolved.
//! - [`StoreError`]: persisting a merge failed. The prior dataset file is left
//!   untouched.
//! - [`ConfigError`]: the configuration file could not be read or is invalid.
//!
//! Classification has no error type because the classifier is total, and an
//! expired session is not an error: it simply loads as absent.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a single extraction strategy rejected a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The strategy's selectors matched nothing usable.
    NoContent,
    /// Neither the body nor the document metadata yielded a title.
    EmptyTitle,
    /// Combined paragraph text was below the plausibility threshold.
    TooShort { chars: usize, min: usize },
    /// More than one false-positive signature (cookie banner, paywall prompt) was found.
    FalsePositive { signatures: Vec<String> },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoContent => write!(f, "no content matched"),
            Rejection::EmptyTitle => write!(f, "no title found"),
            Rejection::TooShort { chars, min } => {
                write!(f, "content too short ({chars} < {min} chars)")
            }
            Rejection::FalsePositive { signatures } => {
                write!(f, "false-positive signatures: {}", signatures.join(", "))
            }
        }
    }
}

/// One entry in the trail of strategies tried for a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub strategy: String,
    pub rejection: Rejection,
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.rejection)
    }
}

fn join_attempts(attempts: &[StrategyAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("no extraction strategy matched: {}", join_attempts(.attempts))]
    NoStrategyMatched { attempts: Vec<StrategyAttempt> },

    #[error("page load for {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("invalid article URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("id {id} already belongs to {existing_url}, refusing to merge {incoming_url}")]
pub struct MergeConflict {
    pub id: String,
    pub existing_url: String,
    pub incoming_url: String,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Conflict(#[from] MergeConflict),

    #[error("no article matches {0}")]
    NotFound(String),

    #[error("invalid source URL {0}")]
    InvalidUrl(String),
}

impl StoreError {
    pub fn io(path: impl fmt::Display, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_string(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error surfaced by the CLI.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("session error: {0}")]
    Session(String),
}

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Extraction(ExtractionFailure::NoStrategyMatched { .. }) => 2,
            AppError::Extraction(ExtractionFailure::Timeout { .. }) => 3,
            AppError::Store(StoreError::Conflict(_)) => 4,
            AppError::Extraction(ExtractionFailure::Navigation { .. }) => 5,
            _ => 1,
        }
    }
}

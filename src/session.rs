//! Local viewer session persistence.
//!
//! The session file holds at most one [`Session`]. Loading is fail-closed: a
//! file that is malformed, expired, or carries an empty token is deleted and
//! the viewer is treated as anonymous. Nothing is verified against a server;
//! the token is supplied by an external login flow and stored as-is.

use crate::error::StoreError;
use crate::models::{Role, Session};
use crate::utils::write_atomic;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

/// A session is usable while `now < expires_at` and the token is present.
pub fn is_valid(session: &Session, now: DateTime<Utc>) -> bool {
    now < session.expires_at && !session.token.trim().is_empty()
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current session, or `None` when absent or unusable.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self, now: DateTime<Utc>) -> Result<Option<Session>, StoreError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(self.path.display(), e)),
        };

        let session: Session = match serde_json::from_slice(&raw) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Discarding malformed session");
                self.clear().await?;
                return Ok(None);
            }
        };

        if !is_valid(&session, now) {
            info!(expires_at = %session.expires_at, "Discarding expired session");
            self.clear().await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    #[instrument(level = "info", skip_all, fields(email = %session.email, role = ?session.role))]
    pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
        write_atomic(&self.path, &serde_json::to_vec_pretty(session)?).await?;
        info!(expires_at = %session.expires_at, "Saved session");
        Ok(())
    }

    /// Remove the session file. Clearing an absent session is not an error.
    pub async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Cleared session");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(self.path.display(), e)),
        }
    }
}

/// Build a session from an externally issued token.
pub fn issue(
    email: &str,
    display_name: &str,
    role: Role,
    token: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Session {
    Session {
        email: email.to_string(),
        display_name: display_name.to_string(),
        role,
        token: token.to_string(),
        issued_at: now,
        expires_at: now + ttl,
    }
}

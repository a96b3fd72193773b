//! The access gate: the one place that decides whether full content is shown.
//!
//! | `has_paywall` | session                     | mode      | badge         |
//! |---------------|-----------------------------|-----------|---------------|
//! | false         | any                         | `Full`    | `None`        |
//! | true          | present, valid, `member`    | `Full`    | `None`        |
//! | true          | anything else               | `Summary` | `MemberOnly`  |
//!
//! A blocked viewer always gets the summary and the external link. Content
//! is loaded only after the decision comes back `Full`, so a blocked render
//! never touches the content document.

use crate::models::{Article, Role, Session};
use crate::session::is_valid;
use crate::store::ArticleStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderMode {
    Full,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Badge {
    None,
    MemberOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub mode: RenderMode,
    pub badge: Badge,
}

impl Decision {
    const FULL: Decision = Decision {
        mode: RenderMode::Full,
        badge: Badge::None,
    };
    const BLOCKED: Decision = Decision {
        mode: RenderMode::Summary,
        badge: Badge::MemberOnly,
    };
}

/// Decide how `article` is shown to the viewer holding `session` at `now`.
pub fn render_mode(article: &Article, session: Option<&Session>, now: DateTime<Utc>) -> Decision {
    if !article.has_paywall {
        return Decision::FULL;
    }
    match session {
        Some(s) if is_valid(s, now) && s.role == Role::Member => Decision::FULL,
        _ => Decision::BLOCKED,
    }
}

/// What the viewer actually receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderedArticle {
    Full {
        id: String,
        title: String,
        source: String,
        source_url: String,
        author: Option<String>,
        paragraphs: Vec<String>,
        badge: Badge,
    },
    Summary {
        id: String,
        title: String,
        source: String,
        source_url: String,
        summary: String,
        badge: Badge,
    },
}

impl RenderedArticle {
    fn summary(article: &Article, badge: Badge) -> Self {
        RenderedArticle::Summary {
            id: article.id.clone(),
            title: article.title.clone(),
            source: article.source.clone(),
            source_url: article.source_url.clone(),
            summary: article.summary.clone(),
            badge,
        }
    }

    pub fn badge(&self) -> Badge {
        match self {
            RenderedArticle::Full { badge, .. } | RenderedArticle::Summary { badge, .. } => *badge,
        }
    }
}

/// Renders articles from a store, applying [`render_mode`] first.
pub struct AccessGate<'a> {
    store: &'a ArticleStore,
}

impl<'a> AccessGate<'a> {
    pub fn new(store: &'a ArticleStore) -> Self {
        Self { store }
    }

    /// Render `article` for the viewer.
    ///
    /// Never fails: an allowed view whose content document is missing or
    /// unreadable falls back to the summary, with no badge since access was
    /// not denied.
    pub async fn render(
        &self,
        article: &Article,
        session: Option<&Session>,
        now: DateTime<Utc>,
    ) -> RenderedArticle {
        let decision = render_mode(article, session, now);
        debug!(id = %article.id, mode = ?decision.mode, badge = ?decision.badge, "Access decision");

        if decision.mode == RenderMode::Summary {
            return RenderedArticle::summary(article, decision.badge);
        }
        if article.content_path.is_none() {
            return RenderedArticle::summary(article, Badge::None);
        }

        match self.store.load_content(article).await {
            Ok(document) if !document.paragraphs.is_empty() => RenderedArticle::Full {
                id: article.id.clone(),
                title: article.title.clone(),
                source: article.source.clone(),
                source_url: article.source_url.clone(),
                author: article.author.clone(),
                paragraphs: document.paragraphs,
                badge: decision.badge,
            },
            Ok(_) => RenderedArticle::summary(article, Badge::None),
            Err(e) => {
                warn!(id = %article.id, error = %e, "Content unavailable, rendering summary");
                RenderedArticle::summary(article, Badge::None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use crate::models::ArticleUpdate;
    use crate::session::issue;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    fn article(has_paywall: bool) -> Article {
        Article {
            id: "news_00000000000000aa".to_string(),
            source_url: "https://wsj.com/articles/x".to_string(),
            source: "The Wall Street Journal".to_string(),
            title: "Headline".to_string(),
            author: None,
            published_at: None,
            summary: "Short summary.".to_string(),
            tags: BTreeSet::new(),
            has_paywall,
            content_path: Some("does/not/matter.json".to_string()),
            scraped_at: now(),
        }
    }

    fn session(role: Role, ttl: Duration) -> Session {
        issue("r@example.com", "Reader", role, "tok", now() - Duration::hours(1), ttl)
    }

    #[test]
    fn test_open_article_is_full_for_everyone() {
        let open = article(false);
        let free = session(Role::Free, Duration::hours(2));
        for s in [None, Some(&free)] {
            assert_eq!(render_mode(&open, s, now()), Decision::FULL);
        }
    }

    #[test]
    fn test_scenario_a_anonymous_viewer_blocked() {
        let decision = render_mode(&article(true), None, now());
        assert_eq!(decision.mode, RenderMode::Summary);
        assert_eq!(decision.badge, Badge::MemberOnly);
    }

    #[test]
    fn test_scenario_b_member_sees_full() {
        let member = session(Role::Member, Duration::hours(2));
        assert_eq!(render_mode(&article(true), Some(&member), now()), Decision::FULL);
    }

    #[test]
    fn test_scenario_d_expired_member_blocked() {
        let mut expired = session(Role::Member, Duration::hours(2));
        expired.expires_at = now() - Duration::seconds(1);
        assert_eq!(render_mode(&article(true), Some(&expired), now()), Decision::BLOCKED);
    }

    #[test]
    fn test_unknown_role_fails_closed() {
        for raw in ["admin", "Member", "MEMBER", "", "premium"] {
            let mut s = session(Role::Member, Duration::hours(2));
            s.role = Role::from(raw);
            assert_eq!(render_mode(&article(true), Some(&s), now()), Decision::BLOCKED, "{raw}");
        }
    }

    async fn store_with(dir: &TempDir, has_paywall: bool) -> (ArticleStore, Article) {
        let paths = PathsConfig {
            dataset: dir.path().join("news.json"),
            content_dir: dir.path().join("news"),
            session: dir.path().join("session.json"),
        };
        let store = ArticleStore::new(&paths, vec![]);
        let update = ArticleUpdate {
            title: Some("Headline".to_string()),
            summary: Some("Short summary.".to_string()),
            has_paywall: Some(has_paywall),
            scraped_at: Some(now()),
            ..ArticleUpdate::for_url("https://wsj.com/articles/x")
        };
        let report = store
            .commit(update, Some(vec!["Full body paragraph.".to_string()]))
            .await
            .unwrap();
        let stored = store.find(&report.id).await.unwrap();
        (store, stored)
    }

    #[tokio::test]
    async fn test_blocked_render_exposes_summary_and_link_only() {
        let dir = TempDir::new().unwrap();
        let (store, stored) = store_with(&dir, true).await;
        let rendered = AccessGate::new(&store).render(&stored, None, now()).await;
        assert_eq!(
            rendered,
            RenderedArticle::Summary {
                id: stored.id.clone(),
                title: "Headline".to_string(),
                source: "wsj.com".to_string(),
                source_url: "https://wsj.com/articles/x".to_string(),
                summary: "Short summary.".to_string(),
                badge: Badge::MemberOnly,
            }
        );
        let json = serde_json::to_string(&rendered).unwrap();
        assert!(!json.contains("Full body paragraph"));
        assert!(!json.contains("content_path"));
    }

    #[tokio::test]
    async fn test_member_render_loads_paragraphs() {
        let dir = TempDir::new().unwrap();
        let (store, stored) = store_with(&dir, true).await;
        let member = session(Role::Member, Duration::hours(2));
        let rendered = AccessGate::new(&store)
            .render(&stored, Some(&member), now())
            .await;
        match rendered {
            RenderedArticle::Full { paragraphs, badge, .. } => {
                assert_eq!(paragraphs, vec!["Full body paragraph.".to_string()]);
                assert_eq!(badge, Badge::None);
            }
            other => panic!("expected full render, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_content_degrades_to_summary() {
        let dir = TempDir::new().unwrap();
        let (store, stored) = store_with(&dir, false).await;
        std::fs::remove_file(store.content_path_for(&stored.id)).unwrap();
        let rendered = AccessGate::new(&store).render(&stored, None, now()).await;
        assert!(matches!(rendered, RenderedArticle::Summary { badge: Badge::None, .. }));
    }
}

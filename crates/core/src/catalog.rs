//! Catalog access: saved shares and indexed media rows.

use anyhow::Context;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::model::{MediaKind, MediaRecord};
use crate::share::{ShareConfig, ShareKind};

#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Catalog { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All saved shares. A row whose kind blob no longer decodes (written
    /// by a newer build) is skipped with a warning, not an error.
    pub async fn read_shares(&self) -> anyhow::Result<Vec<ShareConfig>> {
        let rows = sqlx::query(
            "SELECT id, name, kind, last_access, include_paths FROM shares ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("reading shares")?;

        let mut shares = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let kind_json: String = row.get("kind");
            let kind: ShareKind = match serde_json::from_str(&kind_json) {
                Ok(k) => k,
                Err(e) => {
                    warn!(share = %id, error = %e, "skipping share with undecodable kind");
                    continue;
                }
            };
            let include_paths = row
                .get::<Option<String>, _>("include_paths")
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or_default();
            shares.push(ShareConfig {
                id,
                name: row.get("name"),
                kind,
                last_access: row.get("last_access"),
                include_paths,
            });
        }
        Ok(shares)
    }

    pub async fn add_share(&self, share: &ShareConfig) -> anyhow::Result<()> {
        let kind = serde_json::to_string(&share.kind)?;
        let include_paths = if share.include_paths.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&share.include_paths)?)
        };
        sqlx::query(
            "INSERT INTO shares (id, name, kind, last_access, include_paths)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 kind = excluded.kind,
                 include_paths = excluded.include_paths",
        )
        .bind(&share.id)
        .bind(&share.name)
        .bind(kind)
        .bind(share.last_access)
        .bind(include_paths)
        .execute(&self.pool)
        .await
        .context("saving share")?;
        Ok(())
    }

    /// Remove a share and everything indexed under it.
    pub async fn remove_share(&self, id: &str) -> anyhow::Result<bool> {
        sqlx::query("DELETE FROM media_items WHERE share_id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let res = sqlx::query("DELETE FROM shares WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn touch_share(&self, id: &str, when: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE shares SET last_access = ?2 WHERE id = ?1")
            .bind(id)
            .bind(when)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Conflict-aware upsert keyed on the content identity.
    ///
    /// Observation columns always track the latest sighting; enrichment
    /// columns keep whatever was already filled in so re-scans never wipe
    /// out linkage or guesses made since discovery.
    pub async fn upsert_media(&self, record: &MediaRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO media_items (
                 media_key, share_id, path, size, mtime, kind,
                 series_id, episode_id, season, episode,
                 title_guess, year_guess, discovered_at, last_seen_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(media_key) DO UPDATE SET
                 share_id = excluded.share_id,
                 path = excluded.path,
                 size = excluded.size,
                 mtime = excluded.mtime,
                 kind = excluded.kind,
                 series_id = COALESCE(media_items.series_id, excluded.series_id),
                 episode_id = COALESCE(media_items.episode_id, excluded.episode_id),
                 season = COALESCE(media_items.season, excluded.season),
                 episode = COALESCE(media_items.episode, excluded.episode),
                 title_guess = COALESCE(media_items.title_guess, excluded.title_guess),
                 year_guess = COALESCE(media_items.year_guess, excluded.year_guess),
                 discovered_at = COALESCE(media_items.discovered_at, excluded.discovered_at),
                 last_seen_at = excluded.last_seen_at",
        )
        .bind(&record.media_key)
        .bind(&record.share_id)
        .bind(&record.path)
        .bind(record.size)
        .bind(record.mtime)
        .bind(record.kind.as_str())
        .bind(record.series_id)
        .bind(record.episode_id)
        .bind(record.season)
        .bind(record.episode)
        .bind(&record.title_guess)
        .bind(record.year_guess)
        .bind(record.discovered_at)
        .bind(record.last_seen_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("upserting media {}", record.path))?;
        Ok(())
    }

    pub async fn media_for_share(&self, share_id: &str) -> anyhow::Result<Vec<MediaRecord>> {
        let rows = sqlx::query(
            "SELECT media_key, share_id, path, size, mtime, kind,
                    series_id, episode_id, season, episode,
                    title_guess, year_guess, discovered_at, last_seen_at
             FROM media_items WHERE share_id = ?1 ORDER BY path",
        )
        .bind(share_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MediaRecord {
                media_key: row.get("media_key"),
                share_id: row.get("share_id"),
                path: row.get("path"),
                size: row.get("size"),
                mtime: row.get("mtime"),
                kind: MediaKind::parse(&row.get::<String, _>("kind")),
                series_id: row.get("series_id"),
                episode_id: row.get("episode_id"),
                season: row.get("season"),
                episode: row.get("episode"),
                title_guess: row.get("title_guess"),
                year_guess: row.get("year_guess"),
                discovered_at: row.get("discovered_at"),
                last_seen_at: row.get("last_seen_at"),
            })
            .collect())
    }

    pub async fn media_count(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM media_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

//! Scan engine: walks every saved share and upserts what it finds into
//! the catalog.
//!
//! Local shares are walked on a blocking task feeding an async consumer;
//! remote shares are walked depth-first through their source, bounded by
//! [`MAX_REMOTE_DEPTH`]. Failures are contained at the smallest useful
//! unit: a bad item is logged and skipped, an unresolvable share is
//! skipped whole, and only catalog writes abort a scan.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sources::local::ScopedRoot;
use sources::{normalize_path, ItemFilter, RemoteSource};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::classify::classify_name;
use crate::keys;
use crate::model::MediaRecord;
use crate::share::{self, ShareConfig, ShareKind};

/// Directory levels listed below each remote scan root.
pub const MAX_REMOTE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed(ScanSummary),
    /// Another scan on this scanner was already in flight.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub shares: usize,
    pub skipped_shares: usize,
    pub indexed: u64,
}

pub struct Scanner {
    catalog: Catalog,
    excludes: GlobSet,
    filter: ItemFilter,
    scanning: AtomicBool,
}

/// Clears the in-flight flag on every exit path.
struct ScanGate<'a>(&'a AtomicBool);

impl Drop for ScanGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct LocalItem {
    rel_path: String,
    name: String,
    size: i64,
    mtime: i64,
    media_key: String,
}

impl Scanner {
    pub fn new(catalog: Catalog, excludes: &[String]) -> anyhow::Result<Self> {
        Ok(Scanner {
            catalog,
            excludes: build_globset(excludes)?,
            filter: ItemFilter::video_and_directories(),
            scanning: AtomicBool::new(false),
        })
    }

    /// Scan every saved share once. At most one scan runs per scanner;
    /// a request that arrives while one is in flight is dropped, not
    /// queued.
    pub async fn scan_all_shares(&self) -> anyhow::Result<ScanOutcome> {
        if self.scanning.swap(true, Ordering::SeqCst) {
            debug!("scan already in flight; request dropped");
            return Ok(ScanOutcome::Skipped);
        }
        let _gate = ScanGate(&self.scanning);

        let shares = self.catalog.read_shares().await?;
        let mut summary = ScanSummary::default();
        for share in &shares {
            match self.scan_share(share).await {
                Ok(indexed) => {
                    summary.shares += 1;
                    summary.indexed += indexed;
                    info!(share = %share.name, indexed, "share scanned");
                }
                Err(e) => {
                    summary.skipped_shares += 1;
                    warn!(share = %share.name, error = %e, "share skipped");
                }
            }
        }
        Ok(ScanOutcome::Completed(summary))
    }

    async fn scan_share(&self, share: &ShareConfig) -> anyhow::Result<u64> {
        match &share.kind {
            ShareKind::LocalFolder { root, bookmark } => {
                let root = share::resolve_local_root(root, bookmark.as_deref())?;
                self.scan_local(share, &root).await
            }
            _ => self.scan_remote(share).await,
        }
    }

    /// Walk a local root on a blocking task, classifying and upserting on
    /// the async side as items arrive.
    async fn scan_local(&self, share: &ShareConfig, root: &Path) -> anyhow::Result<u64> {
        let _scope = ScopedRoot::acquire(root)?;

        let roots: Vec<PathBuf> = if share.include_paths.is_empty() {
            vec![root.to_path_buf()]
        } else {
            share
                .include_paths
                .iter()
                .map(|p| root.join(normalize_path(p).trim_start_matches('/')))
                .collect()
        };

        let (tx, mut rx) = mpsc::channel(100);
        let excludes = self.excludes.clone();
        let filter = self.filter.clone();
        let share_id = share.id.clone();
        let share_root = root.to_path_buf();

        let walker = task::spawn_blocking(move || {
            for walk_root in roots {
                for entry in WalkDir::new(&walk_root)
                    .follow_links(true)
                    .into_iter()
                    .filter_entry(|e| e.depth() == 0 || should_descend(e.path(), &excludes))
                {
                    let entry = match entry {
                        Ok(e) => e,
                        Err(e) => {
                            debug!(error = %e, "unreadable entry skipped");
                            continue;
                        }
                    };
                    let path = entry.path();
                    if entry.file_type().is_dir() {
                        continue;
                    }
                    let name = match path.file_name().and_then(|n| n.to_str()) {
                        Some(n) => n.to_string(),
                        None => continue,
                    };
                    if !filter.allows(&name, false) || excludes.is_match(path) {
                        continue;
                    }
                    let meta = match std::fs::metadata(path) {
                        Ok(m) => m,
                        Err(e) => {
                            debug!(path = %path.display(), error = %e, "stat failed, item skipped");
                            continue;
                        }
                    };
                    let rel_path = match path.strip_prefix(&share_root) {
                        Ok(rel) => normalize_path(&rel.to_string_lossy()),
                        Err(_) => continue,
                    };
                    let mtime = meta
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                        .map(|d| d.as_secs() as i64)
                        .unwrap_or_default();

                    #[cfg(unix)]
                    let media_key = keys::local_media_key(&share_id, &meta);
                    #[cfg(not(unix))]
                    let media_key =
                        keys::remote_media_key(&share_id, &rel_path, meta.len(), Some(mtime));

                    let item = LocalItem {
                        rel_path,
                        name,
                        size: meta.len() as i64,
                        mtime,
                        media_key,
                    };
                    if tx.blocking_send(item).is_err() {
                        // Receiver gone, stop walking.
                        return;
                    }
                }
            }
        });

        let mut indexed = 0u64;
        while let Some(item) = rx.recv().await {
            let record = build_record(
                &share.id,
                item.media_key,
                item.rel_path,
                &item.name,
                Some(item.size),
                Some(item.mtime),
            );
            self.catalog
                .upsert_media(&record)
                .await
                .with_context(|| format!("indexing {}", record.path))?;
            indexed += 1;
        }
        walker.await?;
        Ok(indexed)
    }

    /// Depth-first walk through a remote source. Listing failures below
    /// the root are contained to the directory that failed.
    async fn scan_remote(&self, share: &ShareConfig) -> anyhow::Result<u64> {
        let source = share::resolve_source(share)?;

        let mut stack: Vec<(String, usize)> = if share.include_paths.is_empty() {
            vec![("/".to_string(), 0)]
        } else {
            share
                .include_paths
                .iter()
                .map(|p| (normalize_path(p), 0))
                .collect()
        };

        let mut indexed = 0u64;
        while let Some((dir, depth)) = stack.pop() {
            let entries = match source.list(&dir).await {
                Ok(e) => e,
                Err(e) => {
                    warn!(share = %share.name, path = %dir, error = %e, "listing failed, subtree skipped");
                    continue;
                }
            };
            for entry in entries {
                if entry.is_directory {
                    if depth + 1 < MAX_REMOTE_DEPTH {
                        stack.push((entry.path, depth + 1));
                    }
                    continue;
                }
                if !self.filter.allows(&entry.name, false) {
                    continue;
                }
                let size = entry.size.unwrap_or(0);
                let mtime = entry.modified_at.map(|t| t.timestamp());
                let media_key = keys::remote_media_key(&share.id, &entry.path, size, mtime);
                let record = build_record(
                    &share.id,
                    media_key,
                    entry.path,
                    &entry.name,
                    entry.size.map(|s| s as i64),
                    mtime,
                );
                self.catalog
                    .upsert_media(&record)
                    .await
                    .with_context(|| format!("indexing {}", record.path))?;
                indexed += 1;
            }
        }
        Ok(indexed)
    }
}

fn build_record(
    share_id: &str,
    media_key: String,
    path: String,
    name: &str,
    size: Option<i64>,
    mtime: Option<i64>,
) -> MediaRecord {
    let guess = classify_name(name);
    let now = Utc::now().timestamp();
    MediaRecord {
        media_key,
        share_id: share_id.to_string(),
        path,
        size,
        mtime,
        kind: guess.kind,
        series_id: None,
        episode_id: None,
        season: guess.season,
        episode: guess.episode,
        title_guess: guess.title,
        year_guess: guess.year,
        discovered_at: now,
        last_seen_at: now,
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat)?);
    }
    Ok(builder.build()?)
}

fn should_descend(path: &Path, excludes: &GlobSet) -> bool {
    if excludes.is_match(path) {
        return false;
    }
    !is_hidden(path)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaKind;
    use crate::share::ShareConfig;

    async fn test_catalog(name: &str) -> Catalog {
        let url = format!("sqlite://file:{name}?mode=memory&cache=shared");
        let pool = storage::connect(&url).await.unwrap();
        storage::migrate(&pool).await.unwrap();
        Catalog::new(pool)
    }

    async fn local_share(catalog: &Catalog, root: &Path) -> ShareConfig {
        let share = ShareConfig::new(
            "test share",
            ShareKind::LocalFolder {
                root: root.to_string_lossy().into_owned(),
                bookmark: None,
            },
        );
        catalog.add_share(&share).await.unwrap();
        share
    }

    #[tokio::test]
    async fn in_flight_scan_drops_second_request() {
        let catalog = test_catalog("scan_gate").await;
        let scanner = Scanner::new(catalog, &[]).unwrap();

        scanner.scanning.store(true, Ordering::SeqCst);
        assert_eq!(
            scanner.scan_all_shares().await.unwrap(),
            ScanOutcome::Skipped
        );

        scanner.scanning.store(false, Ordering::SeqCst);
        let outcome = scanner.scan_all_shares().await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Completed(_)));
        // The gate is released again after the completed run.
        assert!(!scanner.scanning.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rescan_merges_into_one_row_per_file() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("Show.S01E02.mkv"), b"x").unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"x").unwrap();

        let catalog = test_catalog("scan_merge").await;
        let share = local_share(&catalog, temp.path()).await;
        let scanner = Scanner::new(catalog.clone(), &[]).unwrap();

        let first = scanner.scan_all_shares().await.unwrap();
        assert_eq!(
            first,
            ScanOutcome::Completed(ScanSummary {
                shares: 1,
                skipped_shares: 0,
                indexed: 1,
            })
        );

        scanner.scan_all_shares().await.unwrap();
        let media = catalog.media_for_share(&share.id).await.unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].path, "/Show.S01E02.mkv");
        assert_eq!(media[0].kind, MediaKind::TvEpisode);
        assert_eq!(media[0].season, Some(1));
        assert_eq!(media[0].episode, Some(2));
    }

    #[tokio::test]
    async fn rescan_keeps_enrichment_fields() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("Alpha.mkv"), b"x").unwrap();

        let catalog = test_catalog("scan_enrich").await;
        let share = local_share(&catalog, temp.path()).await;
        let scanner = Scanner::new(catalog.clone(), &[]).unwrap();
        scanner.scan_all_shares().await.unwrap();

        sqlx::query("UPDATE media_items SET title_guess = 'Curated Title', series_id = 7")
            .execute(catalog.pool())
            .await
            .unwrap();

        scanner.scan_all_shares().await.unwrap();
        let media = catalog.media_for_share(&share.id).await.unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].title_guess.as_deref(), Some("Curated Title"));
        assert_eq!(media[0].series_id, Some(7));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn renamed_file_keeps_its_catalog_row() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("Old Name.mkv"), b"payload").unwrap();

        let catalog = test_catalog("scan_rename").await;
        let share = local_share(&catalog, temp.path()).await;
        let scanner = Scanner::new(catalog.clone(), &[]).unwrap();
        scanner.scan_all_shares().await.unwrap();
        let before = catalog.media_for_share(&share.id).await.unwrap();

        std::fs::rename(
            temp.path().join("Old Name.mkv"),
            temp.path().join("New Name.mkv"),
        )
        .unwrap();
        scanner.scan_all_shares().await.unwrap();

        let after = catalog.media_for_share(&share.id).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].media_key, before[0].media_key);
        assert_eq!(after[0].path, "/New Name.mkv");
    }

    #[tokio::test]
    async fn excluded_globs_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join("samples")).unwrap();
        std::fs::write(temp.path().join("samples").join("clip.mkv"), b"x").unwrap();
        std::fs::write(temp.path().join("Feature.mkv"), b"x").unwrap();

        let catalog = test_catalog("scan_exclude").await;
        let share = local_share(&catalog, temp.path()).await;
        let scanner = Scanner::new(catalog.clone(), &["**/samples/**".to_string()]).unwrap();
        scanner.scan_all_shares().await.unwrap();

        let media = catalog.media_for_share(&share.id).await.unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].path, "/Feature.mkv");
    }

    #[tokio::test]
    async fn unresolvable_share_is_skipped_not_fatal() {
        let catalog = test_catalog("scan_stale").await;
        let share = ShareConfig::new(
            "gone",
            ShareKind::LocalFolder {
                root: "/no/such/root".to_string(),
                bookmark: None,
            },
        );
        catalog.add_share(&share).await.unwrap();

        let scanner = Scanner::new(catalog, &[]).unwrap();
        let outcome = scanner.scan_all_shares().await.unwrap();
        assert_eq!(
            outcome,
            ScanOutcome::Completed(ScanSummary {
                shares: 0,
                skipped_shares: 1,
                indexed: 0,
            })
        );
    }
}

//! Local-folder source.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use url::Url;

use crate::{join_path, normalize_path, ItemFilter, RemoteEntry, RemoteSource, SourceError};

/// RAII bracket around root access. Platforms with scoped-permission
/// models (sandboxed roots re-opened from a bookmark) require an
/// acquire/release pair around every enumeration and file open; the
/// release must run on every exit path, so it lives in `Drop`.
pub struct ScopedRoot {
    path: PathBuf,
}

impl ScopedRoot {
    pub fn acquire(path: &Path) -> Result<Self, SourceError> {
        let meta = std::fs::metadata(path)?;
        if !meta.is_dir() {
            return Err(SourceError::NotFound(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        trace!(root = %path.display(), "acquired scoped access");
        Ok(ScopedRoot {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for ScopedRoot {
    fn drop(&mut self) {
        trace!(root = %self.path.display(), "released scoped access");
    }
}

/// Filesystem-backed [`RemoteSource`] rooted at one directory. Paths are
/// relative to the root so catalog entries survive a root re-resolve.
#[derive(Debug)]
pub struct LocalSource {
    root: PathBuf,
    filter: ItemFilter,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>, filter: ItemFilter) -> Self {
        LocalSource {
            root: root.into(),
            filter,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute(&self, path: &str) -> PathBuf {
        let rel = normalize_path(path);
        self.root.join(rel.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl RemoteSource for LocalSource {
    fn display_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, SourceError> {
        let _scope = ScopedRoot::acquire(&self.root)?;
        let rel = normalize_path(path);
        let dir = self.absolute(path);

        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    debug!(entry = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let is_directory = meta.is_dir();
            if !self.filter.allows(&name, is_directory) {
                continue;
            }
            entries.push(RemoteEntry {
                path: join_path(&rel, &name),
                name,
                is_directory,
                size: if is_directory { None } else { Some(meta.len()) },
                modified_at: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        Ok(entries)
    }

    async fn open_file(&self, path: &str) -> Result<String, SourceError> {
        let _scope = ScopedRoot::acquire(&self.root)?;
        let abs = self.absolute(path);
        tokio::fs::metadata(&abs).await?;
        let url = Url::from_file_path(&abs)
            .map_err(|_| SourceError::Protocol(format!("not an absolute path: {}", abs.display())))?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_relative_filtered_entries() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join("Season 1")).unwrap();
        std::fs::write(temp.path().join("pilot.mkv"), b"x").unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(temp.path().join(".hidden.mkv"), b"x").unwrap();

        let source = LocalSource::new(temp.path(), ItemFilter::video_and_directories());
        let mut entries = source.list("/").await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Season 1", "pilot.mkv"]);
        assert_eq!(entries[1].path, "/pilot.mkv");
        assert!(entries[1].size.is_some());
        assert!(entries[0].is_directory);
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let source = LocalSource::new(temp.path(), ItemFilter::video_and_directories());
        let err = source.list("/nope").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn open_file_returns_file_url() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("pilot.mkv"), b"x").unwrap();
        let source = LocalSource::new(temp.path(), ItemFilter::video_and_directories());
        let url = source.open_file("/pilot.mkv").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("pilot.mkv"));
    }
}

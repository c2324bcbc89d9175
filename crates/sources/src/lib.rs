//! Source abstractions for browsing media shares.
//!
//! Every backend (local folder, FTP, SMB, WebDAV) is exposed through the
//! same [`RemoteSource`] contract so browsing and scanning code never has
//! to know which protocol it is talking to.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod filter;
pub mod ftp;
pub mod local;
pub mod smb;
pub mod webdav;

pub use filter::ItemFilter;
pub use ftp::FtpSource;
pub use local::LocalSource;
pub use smb::SmbSource;
pub use webdav::WebDavSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("authentication rejected: {0}")]
    Authentication(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not supported: {0}")]
    Unsupported(&'static str),
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => SourceError::AccessDenied(e.to_string()),
            std::io::ErrorKind::NotFound => SourceError::NotFound(e.to_string()),
            _ => SourceError::Connection(e.to_string()),
        }
    }
}

/// One entry returned by a listing call. Transient: identity is the path,
/// nothing here is persisted directly.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    pub size: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Capability contract every backend satisfies.
///
/// Paths given to and returned from `list`/`open_file` are source-relative,
/// normalized to a single leading `/` with no trailing `/`. Implementations
/// apply their [`ItemFilter`] before returning entries.
#[async_trait::async_trait]
pub trait RemoteSource: std::fmt::Debug + Send + Sync {
    fn display_name(&self) -> String;

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, SourceError>;

    /// Resolve a file path to a URL a player or downloader can use.
    async fn open_file(&self, path: &str) -> Result<String, SourceError>;
}

/// Normalize a source-relative path: single leading `/`, no trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Join a child name onto a normalized base path.
pub fn join_path(base: &str, name: &str) -> String {
    let base = base.trim_matches('/');
    if base.is_empty() {
        format!("/{name}")
    } else {
        format!("/{base}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_extra_separators() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("movies"), "/movies");
        assert_eq!(normalize_path("/movies/"), "/movies");
        assert_eq!(normalize_path("//movies/hd//"), "/movies/hd");
    }

    #[test]
    fn join_keeps_single_separators() {
        assert_eq!(join_path("/", "a.mkv"), "/a.mkv");
        assert_eq!(join_path("/movies", "a.mkv"), "/movies/a.mkv");
        assert_eq!(join_path("movies/", "a.mkv"), "/movies/a.mkv");
    }
}

//! Minimal SMB adapter.

use crate::{RemoteEntry, RemoteSource, SourceError};

/// Placeholder SMB backend. Satisfies the source contract so shares can
/// be saved and resolved, but has no wire client behind it yet.
// TODO: back this with an SMB client library (libsmb2 bindings or pavao).
#[derive(Debug)]
pub struct SmbSource {
    pub host: String,
    pub share: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[async_trait::async_trait]
impl RemoteSource for SmbSource {
    fn display_name(&self) -> String {
        format!("SMB {}", self.host)
    }

    async fn list(&self, _path: &str) -> Result<Vec<RemoteEntry>, SourceError> {
        Ok(Vec::new())
    }

    async fn open_file(&self, _path: &str) -> Result<String, SourceError> {
        Err(SourceError::Unsupported("SMB streaming"))
    }
}

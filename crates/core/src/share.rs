//! Saved shares and their resolution into live sources.
//!
//! A share's backend configuration is stored as a tagged JSON blob so new
//! backend kinds can ship without a schema migration. Early builds stored
//! some payloads as a bare string (just the host or root); decoding still
//! accepts that shape per kind.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sources::{
    FtpSource, ItemFilter, LocalSource, RemoteSource, SmbSource, SourceError, WebDavSource,
};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareConfig {
    pub id: String,
    pub name: String,
    pub kind: ShareKind,
    /// Unix seconds of the last browse or scan touch.
    pub last_access: Option<i64>,
    /// Scan roots relative to the share root; empty means the whole share.
    #[serde(default)]
    pub include_paths: Vec<String>,
}

impl ShareConfig {
    pub fn new(name: impl Into<String>, kind: ShareKind) -> Self {
        ShareConfig {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            last_access: None,
            include_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShareKind {
    LocalFolder {
        root: String,
        /// Opaque reopen token for sandboxed platforms; absent elsewhere.
        bookmark: Option<String>,
    },
    Smb {
        host: String,
        share: Option<String>,
        username: Option<String>,
        password: Option<String>,
    },
    Ftp {
        host: String,
        port: Option<u16>,
        username: Option<String>,
        password: Option<String>,
        passive: Option<bool>,
    },
    Webdav {
        url: String,
        username: Option<String>,
        password: Option<String>,
    },
    Nfs {
        host: String,
    },
    GoogleDrive {
        account_id: String,
    },
    Dropbox {
        account_id: String,
    },
    OneDrive {
        account_id: String,
    },
    Box {
        account_id: String,
    },
    DirectUrl {
        url: String,
    },
}

impl ShareKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ShareKind::LocalFolder { .. } => "localFolder",
            ShareKind::Smb { .. } => "smb",
            ShareKind::Ftp { .. } => "ftp",
            ShareKind::Webdav { .. } => "webdav",
            ShareKind::Nfs { .. } => "nfs",
            ShareKind::GoogleDrive { .. } => "googleDrive",
            ShareKind::Dropbox { .. } => "dropbox",
            ShareKind::OneDrive { .. } => "oneDrive",
            ShareKind::Box { .. } => "box",
            ShareKind::DirectUrl { .. } => "directUrl",
        }
    }

    /// Short human description for listings.
    pub fn subtitle(&self) -> String {
        match self {
            ShareKind::LocalFolder { root, .. } => root.clone(),
            ShareKind::Smb { host, share, .. } => match share {
                Some(s) => format!("{host}/{s}"),
                None => host.clone(),
            },
            ShareKind::Ftp { host, port, .. } => match port {
                Some(p) if *p != 21 => format!("{host}:{p}"),
                _ => host.clone(),
            },
            ShareKind::Webdav { url, .. } | ShareKind::DirectUrl { url } => url.clone(),
            ShareKind::Nfs { host } => host.clone(),
            ShareKind::GoogleDrive { account_id }
            | ShareKind::Dropbox { account_id }
            | ShareKind::OneDrive { account_id }
            | ShareKind::Box { account_id } => account_id.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Tagged {
    #[serde(rename = "type")]
    kind: String,
    payload: Value,
}

#[derive(Serialize, Deserialize)]
struct LocalPayload {
    root: String,
    #[serde(default)]
    bookmark: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SmbPayload {
    host: String,
    #[serde(default)]
    share: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct FtpPayload {
    host: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    passive: Option<bool>,
}

#[derive(Serialize, Deserialize)]
struct DavPayload {
    url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl Serialize for ShareKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::Error;
        let payload = match self {
            ShareKind::LocalFolder { root, bookmark } => serde_json::to_value(LocalPayload {
                root: root.clone(),
                bookmark: bookmark.clone(),
            }),
            ShareKind::Smb {
                host,
                share,
                username,
                password,
            } => serde_json::to_value(SmbPayload {
                host: host.clone(),
                share: share.clone(),
                username: username.clone(),
                password: password.clone(),
            }),
            ShareKind::Ftp {
                host,
                port,
                username,
                password,
                passive,
            } => serde_json::to_value(FtpPayload {
                host: host.clone(),
                port: *port,
                username: username.clone(),
                password: password.clone(),
                passive: *passive,
            }),
            ShareKind::Webdav {
                url,
                username,
                password,
            } => serde_json::to_value(DavPayload {
                url: url.clone(),
                username: username.clone(),
                password: password.clone(),
            }),
            ShareKind::Nfs { host } => Ok(Value::String(host.clone())),
            ShareKind::GoogleDrive { account_id }
            | ShareKind::Dropbox { account_id }
            | ShareKind::OneDrive { account_id }
            | ShareKind::Box { account_id } => Ok(Value::String(account_id.clone())),
            ShareKind::DirectUrl { url } => Ok(Value::String(url.clone())),
        }
        .map_err(S::Error::custom)?;

        Tagged {
            kind: self.kind_name().to_string(),
            payload,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShareKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let tagged = Tagged::deserialize(deserializer)?;
        let bare = |payload: &Value| -> Option<String> {
            payload.as_str().map(str::to_string)
        };

        let kind = match tagged.kind.as_str() {
            "localFolder" => match serde_json::from_value::<LocalPayload>(tagged.payload.clone()) {
                Ok(p) => ShareKind::LocalFolder {
                    root: p.root,
                    bookmark: p.bookmark,
                },
                Err(_) => ShareKind::LocalFolder {
                    root: bare(&tagged.payload)
                        .ok_or_else(|| D::Error::custom("bad localFolder payload"))?,
                    bookmark: None,
                },
            },
            "smb" => match serde_json::from_value::<SmbPayload>(tagged.payload.clone()) {
                Ok(p) => ShareKind::Smb {
                    host: p.host,
                    share: p.share,
                    username: p.username,
                    password: p.password,
                },
                Err(_) => ShareKind::Smb {
                    host: bare(&tagged.payload)
                        .ok_or_else(|| D::Error::custom("bad smb payload"))?,
                    share: None,
                    username: None,
                    password: None,
                },
            },
            "ftp" => match serde_json::from_value::<FtpPayload>(tagged.payload.clone()) {
                Ok(p) => ShareKind::Ftp {
                    host: p.host,
                    port: p.port,
                    username: p.username,
                    password: p.password,
                    passive: p.passive,
                },
                Err(_) => ShareKind::Ftp {
                    host: bare(&tagged.payload)
                        .ok_or_else(|| D::Error::custom("bad ftp payload"))?,
                    port: None,
                    username: None,
                    password: None,
                    passive: None,
                },
            },
            "webdav" => match serde_json::from_value::<DavPayload>(tagged.payload.clone()) {
                Ok(p) => ShareKind::Webdav {
                    url: p.url,
                    username: p.username,
                    password: p.password,
                },
                Err(_) => ShareKind::Webdav {
                    url: bare(&tagged.payload)
                        .ok_or_else(|| D::Error::custom("bad webdav payload"))?,
                    username: None,
                    password: None,
                },
            },
            "nfs" => ShareKind::Nfs {
                host: bare(&tagged.payload).ok_or_else(|| D::Error::custom("bad nfs payload"))?,
            },
            "googleDrive" => ShareKind::GoogleDrive {
                account_id: bare(&tagged.payload)
                    .ok_or_else(|| D::Error::custom("bad googleDrive payload"))?,
            },
            "dropbox" => ShareKind::Dropbox {
                account_id: bare(&tagged.payload)
                    .ok_or_else(|| D::Error::custom("bad dropbox payload"))?,
            },
            "oneDrive" => ShareKind::OneDrive {
                account_id: bare(&tagged.payload)
                    .ok_or_else(|| D::Error::custom("bad oneDrive payload"))?,
            },
            "box" => ShareKind::Box {
                account_id: bare(&tagged.payload)
                    .ok_or_else(|| D::Error::custom("bad box payload"))?,
            },
            "directUrl" => ShareKind::DirectUrl {
                url: bare(&tagged.payload)
                    .ok_or_else(|| D::Error::custom("bad directUrl payload"))?,
            },
            other => return Err(D::Error::custom(format!("unknown share kind: {other}"))),
        };
        Ok(kind)
    }
}

/// Resolve a local share root, preferring the reopen token when it still
/// points at a directory.
pub fn resolve_local_root(root: &str, bookmark: Option<&str>) -> Result<PathBuf, SourceError> {
    if let Some(token) = bookmark {
        let candidate = PathBuf::from(token);
        if candidate.is_dir() {
            return Ok(candidate);
        }
    }
    let root = PathBuf::from(root);
    if root.is_dir() {
        Ok(root)
    } else {
        Err(SourceError::NotFound(format!(
            "share root unavailable: {}",
            root.display()
        )))
    }
}

/// Turn a saved share into a live source. Cloud and NFS kinds are stored
/// but have no backend yet.
pub fn resolve_source(share: &ShareConfig) -> Result<Box<dyn RemoteSource>, SourceError> {
    let filter = ItemFilter::video_and_directories();
    match &share.kind {
        ShareKind::LocalFolder { root, bookmark } => {
            let resolved = resolve_local_root(root, bookmark.as_deref())?;
            Ok(Box::new(LocalSource::new(resolved, filter)))
        }
        ShareKind::Ftp {
            host,
            port,
            username,
            password,
            passive,
        } => Ok(Box::new(FtpSource::new(
            host.clone(),
            *port,
            username.clone(),
            password.clone(),
            *passive,
            filter,
        ))),
        ShareKind::Smb {
            host,
            share: smb_share,
            username,
            password,
        } => Ok(Box::new(SmbSource {
            host: host.clone(),
            share: smb_share.clone(),
            username: username.clone(),
            password: password.clone(),
        })),
        ShareKind::Webdav {
            url,
            username,
            password,
        } => {
            let base = Url::parse(url)
                .map_err(|e| SourceError::Protocol(format!("invalid webdav url: {e}")))?;
            Ok(Box::new(WebDavSource::new(
                base,
                username.clone(),
                password.clone(),
                filter,
            )))
        }
        ShareKind::Nfs { .. } => Err(SourceError::Unsupported("NFS shares")),
        ShareKind::GoogleDrive { .. }
        | ShareKind::Dropbox { .. }
        | ShareKind::OneDrive { .. }
        | ShareKind::Box { .. } => Err(SourceError::Unsupported("cloud drive shares")),
        ShareKind::DirectUrl { .. } => Err(SourceError::Unsupported("direct URL browsing")),
    }
}

//! From-scratch FTP client: one persistent control connection per
//! session, ephemeral data connections per listing, passive mode only.
//!
//! The session is logically single-threaded: every operation takes the
//! session mutex for its full command/reply (or command/data-transfer)
//! cycle, so a new command is never sent while a reply is outstanding.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;

use crate::{normalize_path, ItemFilter, RemoteEntry, RemoteSource, SourceError};

mod listing;
mod reply;

use reply::{parse_epsv, parse_pasv, reply_complete, Reply};

#[derive(Debug, Clone)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub passive: bool,
}

#[derive(Debug)]
pub struct FtpClient {
    config: FtpConfig,
    session: Mutex<FtpSession>,
}

#[derive(Debug, Default)]
struct FtpSession {
    control: Option<BufStream<TcpStream>>,
    logged_in: bool,
}

impl FtpClient {
    pub fn new(config: FtpConfig) -> Self {
        FtpClient {
            config,
            session: Mutex::new(FtpSession::default()),
        }
    }

    pub fn host_display(&self) -> String {
        if self.config.port == 21 {
            self.config.host.clone()
        } else {
            format!("{}:{}", self.config.host, self.config.port)
        }
    }

    /// List a directory over a fresh passive data connection.
    pub async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, SourceError> {
        let mut session = self.session.lock().await;
        let result = session.list(&self.config, path).await;
        if matches!(result, Err(SourceError::Connection(_))) {
            // The control connection is not trustworthy after a transport
            // failure; drop it so the next call re-establishes.
            session.reset();
        }
        result
    }

    /// Build a credentialed `ftp://` URL for direct streaming.
    pub fn file_url(&self, path: &str) -> Result<String, SourceError> {
        let mut url = Url::parse(&format!("ftp://{}:{}", self.config.host, self.config.port))
            .map_err(|e| SourceError::Protocol(format!("invalid ftp url: {e}")))?;
        if let Some(user) = self.config.username.as_deref().filter(|u| !u.is_empty()) {
            let _ = url.set_username(user);
            if let Some(pass) = &self.config.password {
                let _ = url.set_password(Some(pass));
            }
        }
        url.set_path(&normalize_path(path));
        Ok(url.to_string())
    }
}

impl FtpSession {
    fn reset(&mut self) {
        self.control = None;
        self.logged_in = false;
    }

    /// Establish the session if needed: greeting, login, binary mode.
    /// Idempotent; runs at most once per connected session.
    async fn ensure_logged_in(&mut self, config: &FtpConfig) -> Result<(), SourceError> {
        if self.logged_in {
            return Ok(());
        }
        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        self.control = Some(BufStream::new(stream));

        let greeting = self.read_reply().await?;
        if greeting.code != 220 {
            return Err(SourceError::Connection(format!(
                "server rejected connection: {}",
                greeting.message
            )));
        }

        let user = config
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or("anonymous");
        let reply = self.send_command(&format!("USER {user}")).await?;
        match reply.code {
            331 => {
                let pass = config.password.as_deref().unwrap_or("guest");
                let reply = self.send_command(&format!("PASS {pass}")).await?;
                if reply.code != 230 && reply.code != 202 {
                    return Err(SourceError::Authentication(reply.message));
                }
            }
            230 | 202 => {}
            _ => return Err(SourceError::Authentication(reply.message)),
        }

        // Binary mode avoids text mangling on the data channel; best effort.
        let _ = self.send_command("TYPE I").await;

        debug!(host = %config.host, port = config.port, "ftp session established");
        self.logged_in = true;
        Ok(())
    }

    /// Negotiate a passive-mode data connection. PASV first; EPSV as a
    /// fallback for servers that only speak the extended form.
    async fn open_data_connection(
        &mut self,
        config: &FtpConfig,
    ) -> Result<TcpStream, SourceError> {
        if !config.passive {
            return Err(SourceError::Unsupported("active-mode FTP"));
        }

        let pasv = self.send_command("PASV").await?;
        let target = if pasv.code == 227 {
            parse_pasv(&pasv.message)
        } else {
            None
        };
        let (host, port) = match target {
            Some(t) => t,
            None => {
                let epsv = self.send_command("EPSV").await?;
                if epsv.code != 229 {
                    return Err(SourceError::Protocol(format!(
                        "passive negotiation failed: {}",
                        pasv.message
                    )));
                }
                let port = parse_epsv(&epsv.message).ok_or_else(|| {
                    SourceError::Protocol(format!("unparseable EPSV reply: {}", epsv.message))
                })?;
                (config.host.clone(), port)
            }
        };

        trace!(%host, port, "connecting ftp data channel");
        TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))
    }

    async fn list(
        &mut self,
        config: &FtpConfig,
        path: &str,
    ) -> Result<Vec<RemoteEntry>, SourceError> {
        self.ensure_logged_in(config).await?;

        // The data socket must be connected before LIST is issued.
        let mut data = self.open_data_connection(config).await?;
        let normalized = normalize_path(path);
        let reply = self.send_command(&format!("LIST {normalized}")).await?;
        if reply.code != 150 && reply.code != 125 {
            return Err(SourceError::Protocol(format!(
                "LIST failed: {}",
                reply.message
            )));
        }

        let mut payload = Vec::new();
        data.read_to_end(&mut payload)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        drop(data);

        // Completion reply (226/250) is informational; ignore failures.
        let _ = self.read_reply().await;

        let text = String::from_utf8(payload)
            .map_err(|_| SourceError::Protocol("unable to decode directory listing".to_string()))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| listing::parse_unix_line(line, &normalized))
            .collect())
    }

    async fn send_command(&mut self, command: &str) -> Result<Reply, SourceError> {
        let control = self.control.as_mut().ok_or_else(|| {
            SourceError::Connection("control connection unavailable".to_string())
        })?;
        trace!(command = %command.split_whitespace().next().unwrap_or(""), "ftp command");
        control
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        control
            .flush()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        self.read_reply().await
    }

    /// Read one complete reply, buffering partial lines across socket
    /// reads and continuation lines until the terminator arrives.
    async fn read_reply(&mut self) -> Result<Reply, SourceError> {
        let control = self.control.as_mut().ok_or_else(|| {
            SourceError::Connection("control connection unavailable".to_string())
        })?;
        let mut lines = Vec::new();
        loop {
            let mut raw = Vec::new();
            let n = control
                .read_until(b'\n', &mut raw)
                .await
                .map_err(|e| SourceError::Connection(e.to_string()))?;
            if n == 0 {
                return Err(SourceError::Connection(
                    "control connection closed".to_string(),
                ));
            }
            let line = String::from_utf8(raw)
                .map_err(|_| SourceError::Protocol("control line is not utf-8".to_string()))?;
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
            if reply_complete(&lines) {
                return Reply::from_lines(&lines);
            }
        }
    }
}

/// FTP-backed [`RemoteSource`].
#[derive(Debug)]
pub struct FtpSource {
    client: FtpClient,
    filter: ItemFilter,
}

impl FtpSource {
    pub fn new(
        host: impl Into<String>,
        port: Option<u16>,
        username: Option<String>,
        password: Option<String>,
        passive: Option<bool>,
        filter: ItemFilter,
    ) -> Self {
        FtpSource {
            client: FtpClient::new(FtpConfig {
                host: host.into(),
                port: port.unwrap_or(21),
                username,
                password,
                passive: passive.unwrap_or(true),
            }),
            filter,
        }
    }
}

#[async_trait::async_trait]
impl RemoteSource for FtpSource {
    fn display_name(&self) -> String {
        format!("FTP {}", self.client.host_display())
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, SourceError> {
        let entries = self.client.list(path).await?;
        Ok(entries
            .into_iter()
            .filter(|e| self.filter.allows(&e.name, e.is_directory))
            .collect())
    }

    async fn open_file(&self, path: &str) -> Result<String, SourceError> {
        // A credentialed URL lets callers stream directly instead of
        // downloading through the session.
        self.client.file_url(path)
    }
}

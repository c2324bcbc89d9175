//! WebDAV source: PROPFIND-based listing over plain HTTP.

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Method;
use url::Url;

use crate::{normalize_path, ItemFilter, RemoteEntry, RemoteSource, SourceError};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

#[derive(Debug)]
pub struct WebDavSource {
    http: reqwest::Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
    filter: ItemFilter,
}

impl WebDavSource {
    pub fn new(
        base: Url,
        username: Option<String>,
        password: Option<String>,
        filter: ItemFilter,
    ) -> Self {
        WebDavSource {
            http: reqwest::Client::new(),
            base,
            username,
            password,
            filter,
        }
    }

    fn request_url(&self, path: &str) -> Url {
        let rel = normalize_path(path);
        let mut url = self.base.clone();
        let base_path = self.base.path().trim_end_matches('/');
        if rel == "/" {
            url.set_path(if base_path.is_empty() { "/" } else { base_path });
        } else {
            url.set_path(&format!("{base_path}{rel}"));
        }
        url
    }
}

#[async_trait::async_trait]
impl RemoteSource for WebDavSource {
    fn display_name(&self) -> String {
        self.base.host_str().unwrap_or("WebDAV").to_string()
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, SourceError> {
        let url = self.request_url(path);
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| SourceError::Protocol(e.to_string()))?;
        let mut request = self
            .http
            .request(method, url)
            .header("Depth", "1")
            .header("Content-Type", "application/xml")
            .body(PROPFIND_BODY);
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        match response.status().as_u16() {
            207 => {}
            401 | 403 => {
                return Err(SourceError::AccessDenied(format!(
                    "PROPFIND rejected with {}",
                    response.status()
                )))
            }
            404 => return Err(SourceError::NotFound(normalize_path(path))),
            status => {
                return Err(SourceError::Protocol(format!(
                    "unexpected PROPFIND status {status}"
                )))
            }
        }
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Protocol(e.to_string()))?;

        let requested = normalize_path(path);
        let base_path = self.base.path().trim_end_matches('/').to_string();
        let mut entries = Vec::new();
        for item in parse_multistatus(&body)? {
            // href carries the server-absolute, percent-encoded location.
            let href_path = match Url::parse(&item.href) {
                Ok(full) => full.path().to_string(),
                Err(_) => item.href.clone(),
            };
            let decoded = percent_decode_str(&href_path)
                .decode_utf8()
                .map_err(|_| SourceError::Protocol("href is not utf-8".to_string()))?
                .into_owned();
            let rel = normalize_path(decoded.strip_prefix(&base_path).unwrap_or(&decoded));
            if rel == requested {
                // Depth-1 replies include the collection itself.
                continue;
            }
            let name = rel.rsplit('/').next().unwrap_or_default().to_string();
            if name.is_empty() || !self.filter.allows(&name, item.is_collection) {
                continue;
            }
            entries.push(RemoteEntry {
                path: rel,
                name,
                is_directory: item.is_collection,
                size: if item.is_collection {
                    None
                } else {
                    item.content_length
                },
                modified_at: item.last_modified.as_deref().and_then(parse_http_date),
            });
        }
        Ok(entries)
    }

    async fn open_file(&self, path: &str) -> Result<String, SourceError> {
        let mut url = self.request_url(path);
        if let Some(user) = &self.username {
            url.set_username(user).ok();
            url.set_password(self.password.as_deref()).ok();
        }
        Ok(url.to_string())
    }
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Default)]
struct DavItem {
    href: String,
    is_collection: bool,
    content_length: Option<u64>,
    last_modified: Option<String>,
}

/// Walk a 207 multistatus document. Namespace prefixes vary between
/// servers, so elements are matched by local name only.
fn parse_multistatus(xml: &str) -> Result<Vec<DavItem>, SourceError> {
    #[derive(Clone, Copy)]
    enum Field {
        Href,
        Length,
        Modified,
    }

    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();
    let mut current: Option<DavItem> = None;
    let mut field: Option<Field> = None;
    let mut in_resourcetype = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => current = Some(DavItem::default()),
                b"href" => field = Some(Field::Href),
                b"getcontentlength" => field = Some(Field::Length),
                b"getlastmodified" => field = Some(Field::Modified),
                b"resourcetype" => in_resourcetype = true,
                b"collection" if in_resourcetype => {
                    if let Some(item) = current.as_mut() {
                        item.is_collection = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_resourcetype && e.local_name().as_ref() == b"collection" {
                    if let Some(item) = current.as_mut() {
                        item.is_collection = true;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|e| SourceError::Protocol(format!("bad multistatus xml: {e}")))?
                        .into_owned();
                    match f {
                        Field::Href => item.href = text.trim().to_string(),
                        Field::Length => item.content_length = text.trim().parse().ok(),
                        Field::Modified => item.last_modified = Some(text),
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"response" => {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                b"resourcetype" => in_resourcetype = false,
                b"href" | b"getcontentlength" | b"getlastmodified" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::Protocol(format!("bad multistatus xml: {e}")))
            }
            _ => {}
        }
    }
    Ok(items)
}

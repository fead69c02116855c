use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, info, warn};

use crate::errors::{Result, StorageError};
use crate::models::FileMetadata;
use crate::storage::{StorageDriver, TimelineStore};

use super::config::WebDAVConfig;
use super::xml::parse_multistatus;

// reqwest has no constants for the WebDAV extension methods.
fn propfind() -> Method {
    Method::from_bytes(b"PROPFIND").unwrap()
}

fn mkcol() -> Method {
    Method::from_bytes(b"MKCOL").unwrap()
}

/// Reference [`StorageDriver`] speaking plain WebDAV against one entry URL.
///
/// Every logical operation is one or more sequential request/response
/// exchanges carrying HTTP basic auth. There is no retry, timeout or
/// connection-pool layering: the first transport or status failure surfaces
/// to the caller unchanged.
pub struct WebDAVClient {
    config: WebDAVConfig,
    client: Client,
    ignores: HashSet<String>,
    /// Registry key used when recording sync timelines.
    backend: String,
    timelines: Option<Arc<dyn TimelineStore>>,
}

impl std::fmt::Debug for WebDAVClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDAVClient")
            .field("config", &self.config)
            .field("ignores", &self.ignores)
            .field("backend", &self.backend)
            .field("timelines", &self.timelines.is_some())
            .finish()
    }
}

impl WebDAVClient {
    pub fn new(config: WebDAVConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().build()?;
        let ignores = config.ignores.iter().cloned().collect();

        Ok(Self {
            config,
            client,
            ignores,
            backend: String::new(),
            timelines: None,
        })
    }

    /// Attaches the registry collaborator that records per-file sync times
    /// under the given backend name.
    pub fn with_timelines(
        mut self,
        backend: impl Into<String>,
        store: Arc<dyn TimelineStore>,
    ) -> Self {
        self.backend = backend.into();
        self.timelines = Some(store);
        self
    }

    fn ensure_auth(&self) -> Result<()> {
        if self.is_auth() {
            Ok(())
        } else {
            Err(StorageError::Unauthenticated)
        }
    }

    /// Percent-decodes a caller-supplied path once, keeping the raw form when
    /// the encoding is broken.
    fn decode_path(&self, path: &str) -> String {
        match urlencoding::decode(path) {
            Ok(decoded) => decoded.into_owned(),
            Err(err) => {
                warn!("keeping undecodable path {:?}: {}", path, err);
                path.to_string()
            }
        }
    }

    /// Joins a remote path onto the entry URL; the empty path addresses the
    /// entry itself.
    fn url_for(&self, path: &str) -> String {
        let entry = self.config.entry.trim_end_matches('/');
        let decoded = self.decode_path(path);
        let clean = decoded.trim_start_matches('/');

        if clean.is_empty() {
            entry.to_string()
        } else {
            format!("{}/{}", entry, clean)
        }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password))
    }

    /// Issues MKCOL for every ancestor collection of `path`, root to leaf.
    /// Servers answer 200, 201 or 204 whether or not the collection already
    /// exists; anything else fails the whole write.
    async fn ensure_collections(&self, path: &str) -> Result<()> {
        self.ensure_auth()?;

        let decoded = self.decode_path(path);
        let Some((dir, _)) = decoded.rsplit_once('/') else {
            return Ok(());
        };

        let mut current = String::new();
        for part in dir.split('/').filter(|part| !part.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);

            let url = format!("{}/{}", self.config.entry.trim_end_matches('/'), current);
            debug!("MKCOL {}", url);
            let response = self.request(mkcol(), &url).send().await?;
            match response.status() {
                StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => {}
                status => {
                    return Err(StorageError::UnexpectedStatus {
                        method: "MKCOL",
                        path: current,
                        status: status.to_string(),
                    })
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl StorageDriver for WebDAVClient {
    fn auth(&mut self, username: &str, password: &str) {
        self.config.username = username.to_string();
        self.config.password = password.to_string();
    }

    fn is_auth(&self) -> bool {
        !self.config.username.is_empty() && !self.config.password.is_empty()
    }

    fn set_ignore(&mut self, paths: &[String]) {
        self.ignores.extend(paths.iter().cloned());
    }

    async fn last_timeline(&self, name: &str) -> String {
        match &self.timelines {
            Some(store) => store.last_timeline(&self.backend, name).await,
            None => String::new(),
        }
    }

    async fn last_timeline_map(&self) -> HashMap<String, i64> {
        match &self.timelines {
            Some(store) => store.last_timeline_map(&self.backend).await,
            None => HashMap::new(),
        }
    }

    async fn get_data(&self, path: &str) -> Result<Vec<u8>> {
        self.ensure_auth()?;

        let url = self.url_for(path);
        debug!("GET {}", url);
        let response = self.request(Method::GET, &url).send().await?;

        if response.status() != StatusCode::OK {
            return Err(StorageError::UnexpectedStatus {
                method: "GET",
                path: path.to_string(),
                status: response.status().to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn get_stat(&self, path: &str) -> Result<(Vec<u8>, String)> {
        self.ensure_auth()?;

        let url = self.url_for(path);
        debug!("GET {}", url);
        let response = self.request(Method::GET, &url).send().await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(&url)
                    .first()
                    .map(|mime| mime.to_string())
                    .unwrap_or_default()
            });

        if response.status() != StatusCode::OK {
            return Err(StorageError::UnexpectedStatus {
                method: "GET",
                path: path.to_string(),
                status: response.status().to_string(),
            });
        }

        let body = response.bytes().await?.to_vec();
        Ok((body, content_type))
    }

    async fn update_data(&self, data: Vec<u8>, path: &str) -> Result<()> {
        self.ensure_collections(path).await?;

        let url = self.url_for(path);
        debug!("PUT {} ({} bytes)", url, data.len());
        let response = self.request(Method::PUT, &url).body(data).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(StorageError::UnexpectedStatus {
                method: "PUT",
                path: path.to_string(),
                status: status.to_string(),
            }),
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<FileMetadata>> {
        self.ensure_auth()?;

        let url = self.url_for(path);
        debug!("PROPFIND {}", url);
        let response = self
            .request(propfind(), &url)
            .header("Depth", "1")
            .send()
            .await?;

        let body = response.text().await?;
        parse_multistatus(&body)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.ensure_auth()?;
        if path.is_empty() {
            return Err(StorageError::InvalidPath);
        }

        let url = self.url_for(path);
        debug!("DELETE {}", url);
        let response = self.request(Method::DELETE, &url).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(StorageError::UnexpectedStatus {
                method: "DELETE",
                path: path.to_string(),
                status: status.to_string(),
            }),
        }
    }

    async fn update(&self, local: &Path, remote: &str) -> Result<()> {
        self.ensure_auth()?;
        if remote.is_empty() {
            return Err(StorageError::InvalidPath);
        }

        let key = local.to_string_lossy();
        if self.ignores.contains(key.as_ref()) {
            debug!("skipping ignored file {}", key);
            return Ok(());
        }

        let data = tokio::fs::read(local).await?;
        self.update_data(data, remote).await?;

        if let Some(store) = &self.timelines {
            store.set_last_timeline(&self.backend, key.as_ref()).await;
        }

        info!("uploaded {} to {}", key, remote);
        Ok(())
    }
}

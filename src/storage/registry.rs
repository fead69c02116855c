use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::{Result, StorageError};
use crate::models::BackendConfig;

use super::webdav::{WebDAVClient, WebDAVConfig};
use super::{StorageDriver, TimelineStore};

/// Backend name the WebDAV reference driver registers under.
pub const WEBDAV_BACKEND: &str = "webdav";

/// Named backend configurations plus a cache of built driver instances.
///
/// The registry is a cheap handle around shared state, so it can be cloned
/// into every component that needs it and passed to drivers as their
/// [`TimelineStore`]. File-backed registries rewrite their JSON file
/// synchronously on every timeline update; memory-only registries keep
/// timelines in memory.
#[derive(Clone)]
pub struct BackendRegistry {
    shared: Arc<Shared>,
}

struct Shared {
    path: Option<PathBuf>,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    configs: HashMap<String, BackendConfig>,
    drivers: HashMap<String, Arc<dyn StorageDriver>>,
}

impl BackendRegistry {
    /// Memory-only registry; timeline updates are never written to disk.
    pub fn new(configs: HashMap<String, BackendConfig>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: None,
                inner: RwLock::new(Inner {
                    configs,
                    drivers: HashMap::new(),
                }),
            }),
        }
    }

    /// File-backed registry. Read or parse failures surface to the caller.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = tokio::fs::read(&path).await?;
        let configs: HashMap<String, BackendConfig> = serde_json::from_slice(&data)?;
        debug!(
            "loaded {} backend configuration(s) from {}",
            configs.len(),
            path.display()
        );
        Ok(Self {
            shared: Arc::new(Shared {
                path: Some(path),
                inner: RwLock::new(Inner {
                    configs,
                    drivers: HashMap::new(),
                }),
            }),
        })
    }

    /// Read-only lookup of a named backend configuration.
    pub async fn config(&self, backend: &str) -> Option<BackendConfig> {
        self.shared
            .inner
            .read()
            .await
            .configs
            .get(backend)
            .cloned()
    }

    /// Cached driver for the named backend, building, authenticating and
    /// caching one on first use.
    pub async fn get_driver(&self, name: &str) -> Result<Arc<dyn StorageDriver>> {
        if let Some(driver) = self.shared.inner.read().await.drivers.get(name) {
            return Ok(Arc::clone(driver));
        }

        let config = self
            .config(name)
            .await
            .ok_or_else(|| StorageError::MissingConfig(name.to_string()))?;

        // Factory table: adding a backend adds one arm, existing drivers
        // stay untouched.
        let driver: Arc<dyn StorageDriver> = match name {
            WEBDAV_BACKEND => {
                let entry = config.entry.clone().ok_or_else(|| {
                    StorageError::InvalidConfig(format!("backend '{}' has no entry url", name))
                })?;
                let mut client = WebDAVClient::new(WebDAVConfig::new(entry))?;
                client.auth(&config.username, &config.password);
                client.set_ignore(&config.ignores);
                let store = Arc::clone(&self.shared) as Arc<dyn TimelineStore>;
                Arc::new(client.with_timelines(name, store))
            }
            other => return Err(StorageError::UnsupportedBackend(other.to_string())),
        };

        self.shared
            .inner
            .write()
            .await
            .drivers
            .insert(name.to_string(), Arc::clone(&driver));
        Ok(driver)
    }
}

impl Shared {
    /// Rewrites the whole registry to its backing file, if one is configured.
    /// Failures are logged, not returned: timeline recording must not fail a
    /// completed upload.
    async fn dump(&self, configs: &HashMap<String, BackendConfig>) {
        let Some(path) = &self.path else {
            return;
        };
        match serde_json::to_vec(configs) {
            Ok(data) => {
                if let Err(err) = tokio::fs::write(path, data).await {
                    warn!("failed to rewrite registry {}: {}", path.display(), err);
                }
            }
            Err(err) => warn!("failed to encode registry: {}", err),
        }
    }
}

#[async_trait]
impl TimelineStore for Shared {
    async fn last_timeline(&self, backend: &str, name: &str) -> String {
        self.inner
            .read()
            .await
            .configs
            .get(backend)
            .and_then(|config| config.timelines.get(name))
            .cloned()
            .unwrap_or_default()
    }

    async fn last_timeline_map(&self, backend: &str) -> HashMap<String, i64> {
        let inner = self.inner.read().await;
        let Some(config) = inner.configs.get(backend) else {
            return HashMap::new();
        };

        let mut map = HashMap::new();
        for (name, stamp) in &config.timelines {
            match DateTime::parse_from_rfc3339(stamp) {
                Ok(parsed) => {
                    map.insert(name.clone(), parsed.timestamp_nanos_opt().unwrap_or_default());
                }
                Err(err) => warn!("skipping unparseable timeline for {}: {}", name, err),
            }
        }
        map
    }

    async fn set_last_timeline(&self, backend: &str, name: &str) {
        let mut inner = self.inner.write().await;
        let Some(config) = inner.configs.get_mut(backend) else {
            return;
        };
        config.timelines.insert(
            name.to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        self.dump(&inner.configs).await;
    }
}

#[async_trait]
impl TimelineStore for BackendRegistry {
    async fn last_timeline(&self, backend: &str, name: &str) -> String {
        self.shared.last_timeline(backend, name).await
    }

    async fn last_timeline_map(&self, backend: &str) -> HashMap<String, i64> {
        self.shared.last_timeline_map(backend).await
    }

    async fn set_last_timeline(&self, backend: &str, name: &str) {
        self.shared.set_last_timeline(backend, name).await
    }
}

// Storage backends organized by concern: the driver contract, the named
// backend registry, and the WebDAV reference implementation.

pub mod registry;
pub mod webdav;

pub use registry::{BackendRegistry, WEBDAV_BACKEND};
pub use webdav::{WebDAVClient, WebDAVConfig};

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::FileMetadata;

/// Capability set every storage backend implements.
///
/// Data operations check credentials before any I/O and fail with
/// [`StorageError::Unauthenticated`](crate::StorageError::Unauthenticated)
/// until both identity and secret are set. A backend for which an operation
/// has no meaning must still implement it, returning a deterministic
/// empty or no-op result.
#[async_trait]
pub trait StorageDriver: Send + Sync + Debug {
    /// Records credentials for subsequent requests.
    fn auth(&mut self, username: &str, password: &str);

    /// True once both identity and secret are non-empty.
    fn is_auth(&self) -> bool;

    /// Extends the exact-match set of local paths [`update`](Self::update)
    /// skips.
    fn set_ignore(&mut self, paths: &[String]);

    /// Last recorded sync timestamp for a local path, empty when unknown.
    async fn last_timeline(&self, name: &str) -> String;

    /// All recorded sync timestamps, as unix nanoseconds.
    async fn last_timeline_map(&self) -> HashMap<String, i64>;

    /// Fetches the full content of a remote file.
    async fn get_data(&self, path: &str) -> Result<Vec<u8>>;

    /// Fetches content plus its content type, inferred from the file
    /// extension when the server does not say.
    async fn get_stat(&self, path: &str) -> Result<(Vec<u8>, String)>;

    /// Writes the bytes to the remote path, provisioning missing ancestor
    /// collections first.
    async fn update_data(&self, data: Vec<u8>, path: &str) -> Result<()>;

    /// Lists the resources directly under a remote path.
    async fn list(&self, path: &str) -> Result<Vec<FileMetadata>>;

    /// Removes a remote file. The empty path is rejected before any network
    /// call.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Uploads a local file to the remote path and records the sync time.
    /// Ignored paths are skipped without any network call and report success.
    async fn update(&self, local: &Path, remote: &str) -> Result<()>;
}

/// Per-backend sync bookkeeping the registry exposes to its drivers.
///
/// Timestamps are only ever replaced with the current time, never rolled
/// back; reads on an unknown backend or file yield empty values.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    async fn last_timeline(&self, backend: &str, name: &str) -> String;

    async fn last_timeline_map(&self, backend: &str) -> HashMap<String, i64>;

    async fn set_last_timeline(&self, backend: &str, name: &str);
}

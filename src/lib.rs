//! Policy and file persistence on WebDAV-backed remote storage.
//!
//! A [`PolicyAdapter`] keeps an ordered policy document in sync with a remote
//! JSON blob through the pluggable [`StorageDriver`] contract, whose
//! reference implementation is the [`WebDAVClient`]. A [`BackendRegistry`]
//! holds named backend configurations, builds drivers on demand and tracks
//! per-file sync timelines for incremental uploads.

pub mod adapter;
pub mod errors;
pub mod models;
pub mod storage;

pub use adapter::{PolicyAdapter, PolicyModel};
pub use errors::{Result, StorageError};
pub use models::{BackendConfig, FileMetadata, PolicyRule};
pub use storage::registry::{BackendRegistry, WEBDAV_BACKEND};
pub use storage::webdav::{WebDAVClient, WebDAVConfig};
pub use storage::{StorageDriver, TimelineStore};

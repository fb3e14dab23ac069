//! Object storage abstraction layer
//!
//! This module defines the [`ObjectStorage`] trait over the bucket/path addressed object store
//! that holds avatars and enrollment documents. Two implementations exist:
//!
//! - [`supabase::SupabaseStorage`]: the backend-as-a-service storage REST API
//! - [`local::LocalStorage`]: a directory on disk, for development and tests

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{config::StorageBackend, supabase::SupabaseClient};

pub mod local;
#[cfg(test)]
pub mod memory;
pub mod supabase;

/// Create a storage backend from configuration
///
/// Returns `None` when the configured backend needs credentials that are not present.
pub fn create_storage(backend: &StorageBackend, client: Option<&SupabaseClient>) -> Option<Arc<dyn ObjectStorage>> {
    match backend {
        StorageBackend::Supabase => client.map(|c| Arc::new(supabase::SupabaseStorage::new(c.clone())) as Arc<dyn ObjectStorage>),
        StorageBackend::Local { path, public_base_url } => Some(Arc::new(local::LocalStorage::new(path.clone(), public_base_url.clone()))),
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while talking to object storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The object does not exist
    #[error("Object not found: {path}")]
    NotFound { path: String },

    /// The backend rejected the call; `message` is the backend's own message
    #[error("{message}")]
    Backend { status: Option<u16>, message: String },

    #[error("Invalid object path '{0}'")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One entry of a directory listing. Sub-directories appear as entries without metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ObjectEntry {
    pub fn size(&self) -> u64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("size"))
            .and_then(|s| s.as_u64())
            .unwrap_or(0)
    }
}

/// Object contents together with the content type reported by the backend.
#[derive(Debug, Clone)]
pub struct DownloadedObject {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Trait for object storage backends.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` inside `bucket` and return the object's public URL
    async fn upload(&self, bucket: &str, path: &str, bytes: Bytes, content_type: &str) -> Result<String>;

    /// Remove objects. Paths that do not exist are not an error.
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;

    /// List the direct children of `prefix` (a directory path without trailing slash, `""` for the
    /// bucket root), sorted by name
    async fn list(&self, bucket: &str, prefix: &str, limit: u32, offset: u32) -> Result<Vec<ObjectEntry>>;

    async fn download(&self, bucket: &str, path: &str) -> Result<DownloadedObject>;

    /// Public URL under which `path` is served. Pure string construction, no I/O.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Splits an object path into its parent directory (`""` at the root) and file name.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("avatars/student-avatars/x.png"), ("avatars/student-avatars", "x.png"));
        assert_eq!(split_path("x.png"), ("", "x.png"));
    }

    #[test]
    fn test_entry_size() {
        let entry: ObjectEntry = serde_json::from_value(serde_json::json!({
            "name": "x.png",
            "id": "abc",
            "metadata": { "size": 2048, "mimetype": "image/png" }
        }))
        .unwrap();
        assert_eq!(entry.size(), 2048);

        let folder: ObjectEntry = serde_json::from_value(serde_json::json!({ "name": "student-avatars", "id": null })).unwrap();
        assert_eq!(folder.size(), 0);
    }
}

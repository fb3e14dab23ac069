//! In-memory storage backend for tests, with switches to simulate misbehaving backends.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{DownloadedObject, ObjectEntry, ObjectStorage, Result, StorageError, split_path};

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<(String, String), (Bytes, String)>>,
    removals: Mutex<Vec<(String, String)>>,
    ignore_removals: bool,
    fail_removals: Option<String>,
    fail_listing: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acknowledge removals without removing anything (an eventually consistent backend)
    pub fn ignoring_removals(mut self) -> Self {
        self.ignore_removals = true;
        self
    }

    /// Fail every removal with this backend message
    pub fn failing_removals(mut self, message: &str) -> Self {
        self.fail_removals = Some(message.to_string());
        self
    }

    /// Fail every listing with this backend message
    pub fn failing_listing(mut self, message: &str) -> Self {
        self.fail_listing = Some(message.to_string());
        self
    }

    pub fn with_object(self, bucket: &str, path: &str) -> Self {
        self.insert(bucket, path, Bytes::from_static(b"object"), "image/png");
        self
    }

    pub fn insert(&self, bucket: &str, path: &str, bytes: Bytes, content_type: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), path.to_string()), (bytes, content_type.to_string()));
    }

    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(&(bucket.to_string(), path.to_string()))
    }

    /// Every `(bucket, path)` a removal was requested for, in order
    pub fn removals(&self) -> Vec<(String, String)> {
        self.removals.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: Bytes, content_type: &str) -> Result<String> {
        self.insert(bucket, path, bytes, content_type);
        Ok(self.public_url(bucket, path))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        if let Some(message) = &self.fail_removals {
            return Err(StorageError::Backend {
                status: Some(403),
                message: message.clone(),
            });
        }
        let mut removals = self.removals.lock().unwrap();
        let mut objects = self.objects.lock().unwrap();
        for path in paths {
            removals.push((bucket.to_string(), path.clone()));
            if !self.ignore_removals {
                objects.remove(&(bucket.to_string(), path.clone()));
            }
        }
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str, limit: u32, offset: u32) -> Result<Vec<ObjectEntry>> {
        if let Some(message) = &self.fail_listing {
            return Err(StorageError::Backend {
                status: Some(500),
                message: message.clone(),
            });
        }
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|((b, path), _)| b == bucket && split_path(path).0 == prefix)
            .map(|((_, path), (bytes, _))| ObjectEntry {
                name: split_path(path).1.to_string(),
                id: Some(path.clone()),
                updated_at: None,
                metadata: Some(serde_json::json!({ "size": bytes.len() })),
            })
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<DownloadedObject> {
        let objects = self.objects.lock().unwrap();
        match objects.get(&(bucket.to_string(), path.to_string())) {
            Some((bytes, content_type)) => Ok(DownloadedObject {
                bytes: bytes.clone(),
                content_type: Some(content_type.clone()),
            }),
            None => Err(StorageError::NotFound { path: path.to_string() }),
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("http://storage.test/storage/v1/object/public/{bucket}/{path}")
    }
}

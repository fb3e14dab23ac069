//! Local filesystem storage backend - objects live at `<base_path>/<bucket>/<path>`.
//! Useful for development and testing.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{DownloadedObject, ObjectEntry, ObjectStorage, Result, StorageError};

pub struct LocalStorage {
    base_path: PathBuf,
    public_base_url: Url,
}

impl LocalStorage {
    pub fn new(base_path: PathBuf, public_base_url: Url) -> Self {
        Self { base_path, public_base_url }
    }

    /// Map a bucket and object path onto the filesystem, refusing anything that escapes the bucket.
    fn full_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) || bucket.contains(['/', '\\']) || bucket == ".." {
            return Err(StorageError::InvalidPath(format!("{bucket}/{path}")));
        }
        Ok(self.base_path.join(bucket).join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: Bytes, _content_type: &str) -> Result<String> {
        let full_path = self.full_path(bucket, path)?;

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;

        Ok(self.public_url(bucket, path))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        for path in paths {
            let full_path = self.full_path(bucket, path)?;
            match fs::remove_file(&full_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("{} already absent", full_path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str, limit: u32, offset: u32) -> Result<Vec<ObjectEntry>> {
        let dir = if prefix.is_empty() {
            self.base_path.join(bucket)
        } else {
            self.full_path(bucket, prefix)?
        };

        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            // Listing a prefix with nothing under it is an empty listing, not an error
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                entries.push(ObjectEntry {
                    name,
                    id: None,
                    updated_at: None,
                    metadata: None,
                });
            } else {
                let mimetype = mime_guess::from_path(&name).first_or_octet_stream().to_string();
                entries.push(ObjectEntry {
                    id: Some(name.clone()),
                    name,
                    updated_at: None,
                    metadata: Some(serde_json::json!({ "size": metadata.len(), "mimetype": mimetype })),
                });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<DownloadedObject> {
        let full_path = self.full_path(bucket, path)?;
        match fs::read(&full_path).await {
            Ok(content) => Ok(DownloadedObject {
                bytes: Bytes::from(content),
                content_type: Some(mime_guess::from_path(path).first_or_octet_stream().to_string()),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound { path: path.to_string() }),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        let mut url = self.public_base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(bucket).extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url.to_string()
    }
}

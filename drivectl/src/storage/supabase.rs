//! Object storage over the backend-as-a-service storage REST API (`/storage/v1`).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, header::CONTENT_TYPE};
use serde_json::json;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{DownloadedObject, ObjectEntry, ObjectStorage, Result, StorageError};
use crate::supabase::{BackendFailure, SupabaseClient};

pub struct SupabaseStorage {
    client: SupabaseClient,
}

impl SupabaseStorage {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// `<base>/storage/v1/<segments...>/<key segments...>`, percent-encoding each segment.
    fn object_url(&self, segments: &[&str], key: &str) -> Result<Url> {
        let mut url = self.client.base_url().clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Other(anyhow::anyhow!("backend URL cannot be a base")))?
            .pop_if_empty()
            .extend(["storage", "v1"])
            .extend(segments)
            .extend(key.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn failure(failure: BackendFailure) -> StorageError {
        StorageError::Backend {
            status: Some(failure.status.as_u16()),
            message: failure.message,
        }
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()), err)]
    async fn upload(&self, bucket: &str, path: &str, bytes: Bytes, content_type: &str) -> Result<String> {
        let url = self.object_url(&["object", bucket], path)?;
        let response = self
            .client
            .request_to(Method::POST, url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .header("cache-control", "max-age=3600")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(BackendFailure::from_response(response).await));
        }

        Ok(self.public_url(bucket, path))
    }

    #[instrument(skip(self), err)]
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let url = self.object_url(&["object", bucket], "")?;
        let response = self
            .client
            .request_to(Method::DELETE, url)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;

        if response.status().is_success() {
            // The body lists the objects that were actually removed; an empty list for a
            // non-empty request means they were already gone.
            let removed: Vec<ObjectEntry> = response.json().await.unwrap_or_default();
            debug!("Removed {} of {} objects from {}", removed.len(), paths.len(), bucket);
            return Ok(());
        }

        let failure = BackendFailure::from_response(response).await;
        if failure.is_not_found() {
            debug!("Objects already absent from {}: {}", bucket, failure.message);
            return Ok(());
        }

        warn!("Storage remove failed with {}: {}", failure.status, failure.message);
        Err(Self::failure(failure))
    }

    #[instrument(skip(self), err)]
    async fn list(&self, bucket: &str, prefix: &str, limit: u32, offset: u32) -> Result<Vec<ObjectEntry>> {
        let url = self.object_url(&["object", "list", bucket], "")?;
        let response = self
            .client
            .request_to(Method::POST, url)
            .json(&json!({
                "prefix": prefix,
                "limit": limit,
                "offset": offset,
                "sortBy": { "column": "name", "order": "asc" },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(BackendFailure::from_response(response).await));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| StorageError::Other(anyhow::anyhow!("error decoding listing: {}", e)))
    }

    #[instrument(skip(self), err)]
    async fn download(&self, bucket: &str, path: &str) -> Result<DownloadedObject> {
        let url = self.object_url(&["object", "authenticated", bucket], path)?;
        let response = self.client.request_to(Method::GET, url).send().await?;

        if !response.status().is_success() {
            let failure = BackendFailure::from_response(response).await;
            if failure.is_not_found() {
                return Err(StorageError::NotFound { path: path.to_string() });
            }
            return Err(Self::failure(failure));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        Ok(DownloadedObject { bytes, content_type })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        match self.object_url(&["object", "public", bucket], path) {
            Ok(url) => url.to_string(),
            // Only reachable with a cannot-be-a-base project URL
            Err(_) => format!("{}storage/v1/object/public/{}/{}", self.client.base_url(), bucket, path),
        }
    }
}

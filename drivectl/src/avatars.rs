//! Avatar path resolution, deletion and post-delete verification.
//!
//! Stored image references come in three shapes, all of which must be accepted:
//!
//! - a full public URL (`https://<project>/storage/v1/object/public/avatars/student-avatars/x.png`)
//! - a bucket-relative path that already contains the sub-prefix token (`avatars/foo.jpg`)
//! - a bare URL or filename whose last segment has an extension (`https://host/x/abc123.png`)
//!
//! [`PathResolver::resolve`] turns a reference into a [`ResolvedPath`]; [`delete_object`] removes it
//! idempotently; [`verify_deleted`] lists the parent directory to check the object is really gone.
//! [`AvatarCleaner`] chains the three and is what every entry point calls.
//!
//! Verification is advisory. Listings from eventually consistent backends may lag behind deletes,
//! so a mismatch is logged and reported, never turned into an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::StorageConfig;
use crate::storage::{ObjectStorage, StorageError, split_path};

/// Which resolution rule produced a [`ResolvedPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Text after the public-URL marker
    PublicUrl,
    /// The reference already contained the sub-prefix token and is used verbatim
    PrefixToken,
    /// Default prefix joined with the reference's last segment
    FileName,
}

/// Bucket-relative path derived from a stored reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    path: String,
    method: ResolutionMethod,
}

impl ResolvedPath {
    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> ResolutionMethod {
        self.method
    }

    /// Parent directory, `""` when the path has no `/`
    pub fn parent(&self) -> &str {
        split_path(&self.path).0
    }

    pub fn file_name(&self) -> &str {
        split_path(&self.path).1
    }

    /// Key of the object inside `bucket`.
    ///
    /// Public URLs carry the bucket name as their first segment after the marker; it is not part
    /// of the object key and is dropped here. Other forms are keys already.
    pub fn object_key<'a>(&'a self, bucket: &str) -> &'a str {
        match self.method {
            ResolutionMethod::PublicUrl => self
                .path
                .strip_prefix(bucket)
                .and_then(|rest| rest.strip_prefix('/'))
                .filter(|rest| !rest.is_empty())
                .unwrap_or(&self.path),
            ResolutionMethod::PrefixToken | ResolutionMethod::FileName => &self.path,
        }
    }
}

impl std::fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Ordered, first-match-wins resolution of stored references.
#[derive(Debug, Clone)]
pub struct PathResolver {
    marker: String,
    token: String,
    default_prefix: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

impl PathResolver {
    pub fn new(marker: impl Into<String>, token: impl Into<String>, default_prefix: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            token: token.into(),
            default_prefix: default_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.public_url_marker, &config.path_token, &config.default_prefix)
    }

    pub fn resolve(&self, reference: &str) -> Option<ResolvedPath> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if reference.contains(&self.marker) {
            let parts: Vec<&str> = reference.split(self.marker.as_str()).collect();
            if let [_, path] = parts.as_slice() {
                if !path.is_empty() {
                    return Some(ResolvedPath {
                        path: path.to_string(),
                        method: ResolutionMethod::PublicUrl,
                    });
                }
            }
        }

        if reference.contains(&self.token) {
            return Some(ResolvedPath {
                path: reference.to_string(),
                method: ResolutionMethod::PrefixToken,
            });
        }

        let file_name = reference.rsplit('/').next().unwrap_or_default();
        if !file_name.is_empty() && file_name.contains('.') {
            return Some(ResolvedPath {
                path: format!("{}/{}", self.default_prefix, file_name),
                method: ResolutionMethod::FileName,
            });
        }

        None
    }
}

/// Remove one object. A missing object counts as deleted; any other failure is returned with the
/// backend's message. Never retries.
pub async fn delete_object(storage: &dyn ObjectStorage, bucket: &str, key: &str) -> Result<(), StorageError> {
    match storage.remove(bucket, &[key.to_string()]).await {
        Ok(()) => Ok(()),
        Err(StorageError::NotFound { .. }) => {
            debug!("{}/{} was already absent", bucket, key);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Outcome of listing the parent directory after a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    Gone,
    /// The file name is still listed; `remaining` holds every name in the directory
    StillPresent { remaining: Vec<String> },
    /// The listing itself failed
    Unverifiable { error: String },
}

/// List `key`'s parent directory and look for its file name.
///
/// The directory is read in pages of `limit` entries until a short page comes back.
pub async fn verify_deleted(storage: &dyn ObjectStorage, bucket: &str, key: &str, limit: u32) -> Verification {
    let (directory, file_name) = split_path(key);
    let limit = limit.max(1);
    let mut names = Vec::new();
    let mut offset = 0;

    loop {
        let page = match storage.list(bucket, directory, limit, offset).await {
            Ok(page) => page,
            Err(e) => return Verification::Unverifiable { error: e.to_string() },
        };
        let page_len = page.len() as u32;
        names.extend(page.into_iter().map(|e| e.name));
        if page_len < limit {
            break;
        }
        offset += page_len;
    }

    if names.iter().any(|name| name == file_name) {
        Verification::StillPresent { remaining: names }
    } else {
        Verification::Gone
    }
}

/// Everything that happened while removing one avatar reference.
#[derive(Debug, Clone, Serialize)]
pub struct AvatarRemoval {
    pub resolved: Option<ResolvedPath>,
    pub deleted: bool,
    /// Backend message when the remove call failed
    pub error: Option<String>,
    /// `None` when nothing was deleted or verification is switched off
    pub verification: Option<Verification>,
    pub message: String,
}

impl AvatarRemoval {
    /// Deleted, and verification (when it ran) did not contradict it.
    pub fn is_confirmed(&self) -> bool {
        self.deleted && matches!(self.verification, None | Some(Verification::Gone))
    }
}

/// What a lookup of a single object found.
#[derive(Debug, Clone, Serialize)]
pub struct ExistenceReport {
    pub file_path: String,
    pub directory_path: String,
    pub file_name: String,
    pub exists: bool,
    /// Set when the object could be downloaded
    pub size: Option<u64>,
    pub content_type: Option<String>,
    /// Set when the download failed and the directory listing was consulted instead
    pub download_error: Option<String>,
    pub files_in_directory: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceDeleteStage {
    ListBefore,
    Remove,
    ListAfter,
}

impl ForceDeleteStage {
    pub fn describe(&self) -> &'static str {
        match self {
            ForceDeleteStage::ListBefore => "Error listing files before deletion",
            ForceDeleteStage::Remove => "Error deleting file",
            ForceDeleteStage::ListAfter => "Error listing files after deletion",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{}: {source}", .stage.describe())]
pub struct ForceDeleteError {
    pub stage: ForceDeleteStage,
    #[source]
    pub source: StorageError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForceDeleteReport {
    pub file_path: String,
    pub file_name: String,
    pub existed_before: bool,
    pub files_before: Vec<String>,
    /// `None` when the object was already gone and nothing was deleted
    pub files_after: Option<Vec<String>>,
    pub exists_after: bool,
    pub download_works: bool,
    pub download_error: Option<String>,
}

impl ForceDeleteReport {
    pub fn deletion_successful(&self) -> bool {
        !self.exists_after && !self.download_works
    }
}

fn failed_at(stage: ForceDeleteStage) -> impl FnOnce(StorageError) -> ForceDeleteError {
    move |source| ForceDeleteError { stage, source }
}

/// Resolve, delete and verify avatar references against the avatar bucket.
#[derive(Clone)]
pub struct AvatarCleaner {
    storage: Arc<dyn ObjectStorage>,
    resolver: PathResolver,
    bucket: String,
    verify: bool,
    list_limit: u32,
    settle_delay: std::time::Duration,
}

impl AvatarCleaner {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: &StorageConfig) -> Self {
        Self {
            storage,
            resolver: PathResolver::from_config(config),
            bucket: config.avatar_bucket.clone(),
            verify: config.verify_deletions,
            list_limit: config.verification_list_limit,
            settle_delay: config.settle_delay,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Resolve `reference`, delete the object and (when enabled) verify it is gone. Never fails:
    /// every outcome is described by the returned report.
    #[instrument(skip(self))]
    pub async fn remove(&self, reference: &str) -> AvatarRemoval {
        let Some(resolved) = self.resolver.resolve(reference) else {
            warn!("Could not resolve a storage path from avatar reference");
            return AvatarRemoval {
                resolved: None,
                deleted: false,
                error: None,
                verification: None,
                message: "Could not extract the file path from the avatar reference".to_string(),
            };
        };

        let key = resolved.object_key(&self.bucket).to_string();
        debug!("Resolved avatar reference to {} ({:?}), key {}", resolved, resolved.method(), key);

        if let Err(e) = delete_object(self.storage.as_ref(), &self.bucket, &key).await {
            warn!("Failed to delete avatar {}: {}", key, e);
            return AvatarRemoval {
                resolved: Some(resolved),
                deleted: false,
                message: format!("Error deleting avatar: {e}"),
                error: Some(e.to_string()),
                verification: None,
            };
        }

        let verification = if self.verify {
            let outcome = verify_deleted(self.storage.as_ref(), &self.bucket, &key, self.list_limit).await;
            match &outcome {
                Verification::Gone => debug!("Verified {} is gone", key),
                Verification::StillPresent { .. } => warn!("{} is still listed after deletion", key),
                Verification::Unverifiable { error } => warn!("Could not verify deletion of {}: {}", key, error),
            }
            Some(outcome)
        } else {
            None
        };

        let message = match &verification {
            Some(Verification::StillPresent { .. }) => "File was not actually deleted",
            Some(Verification::Unverifiable { .. }) => "Could not verify that the file was deleted",
            Some(Verification::Gone) | None => "Avatar deleted from storage",
        };
        info!("Avatar {} removed", key);

        AvatarRemoval {
            resolved: Some(resolved),
            deleted: true,
            error: None,
            verification,
            message: message.to_string(),
        }
    }

    /// Download `path`; if that fails, fall back to looking for it in its directory listing.
    #[instrument(skip(self), err)]
    pub async fn check_exists(&self, path: &str) -> Result<ExistenceReport, StorageError> {
        let (directory, file_name) = split_path(path);
        let mut report = ExistenceReport {
            file_path: path.to_string(),
            directory_path: directory.to_string(),
            file_name: file_name.to_string(),
            exists: false,
            size: None,
            content_type: None,
            download_error: None,
            files_in_directory: None,
        };

        match self.storage.download(&self.bucket, path).await {
            Ok(object) => {
                report.exists = true;
                report.size = Some(object.bytes.len() as u64);
                report.content_type = object.content_type;
            }
            Err(download_error) => {
                debug!("Download of {} failed ({}), listing {}", path, download_error, directory);
                let entries = self.storage.list(&self.bucket, directory, self.list_limit, 0).await?;
                let names: Vec<String> = entries.into_iter().map(|e| e.name).collect();
                report.exists = names.iter().any(|n| n == file_name);
                report.download_error = Some(download_error.to_string());
                report.files_in_directory = Some(names);
            }
        }

        Ok(report)
    }

    /// List, delete, wait `settle_delay`, list again and try a download, reporting each view.
    #[instrument(skip(self), err)]
    pub async fn force_delete(&self, path: &str) -> Result<ForceDeleteReport, ForceDeleteError> {
        let (directory, file_name) = split_path(path);
        let before = self
            .storage
            .list(&self.bucket, directory, self.list_limit, 0)
            .await
            .map_err(failed_at(ForceDeleteStage::ListBefore))?;
        let files_before: Vec<String> = before.into_iter().map(|e| e.name).collect();

        if !files_before.iter().any(|n| n == file_name) {
            info!("{} does not exist, nothing to delete", path);
            return Ok(ForceDeleteReport {
                file_path: path.to_string(),
                file_name: file_name.to_string(),
                existed_before: false,
                files_before,
                files_after: None,
                exists_after: false,
                download_works: false,
                download_error: None,
            });
        }

        delete_object(self.storage.as_ref(), &self.bucket, path)
            .await
            .map_err(failed_at(ForceDeleteStage::Remove))?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let after = self
            .storage
            .list(&self.bucket, directory, self.list_limit, 0)
            .await
            .map_err(failed_at(ForceDeleteStage::ListAfter))?;
        let files_after: Vec<String> = after.into_iter().map(|e| e.name).collect();
        let exists_after = files_after.iter().any(|n| n == file_name);

        let (download_works, download_error) = match self.storage.download(&self.bucket, path).await {
            Ok(_) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };

        if exists_after || download_works {
            warn!("{} still present after forced delete", path);
        }

        Ok(ForceDeleteReport {
            file_path: path.to_string(),
            file_name: file_name.to_string(),
            existed_before: true,
            files_before,
            files_after: Some(files_after),
            exists_after,
            download_works,
            download_error,
        })
    }
}

//! Response body of the backend project check.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which backend settings are absent
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MissingSettings {
    pub supabase_url: bool,
    pub service_role_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub url: String,
    /// First label of the project host
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BucketAccess {
    pub name: String,
    pub accessible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListedFile {
    pub name: String,
    pub size: u64,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FolderListing {
    pub count: usize,
    pub files: Vec<ListedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyProjectResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<MissingSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_info: Option<ProjectInfo>,
    /// One entry per configured bucket
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bucket_access: Vec<BucketAccess>,
    /// Non-empty folders of the avatar bucket, keyed by folder (`""` is the bucket root)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub file_listing: BTreeMap<String, FolderListing>,
}

use std::collections::BTreeMap;

use crate::AppState;
use crate::api::models::project::{BucketAccess, FolderListing, ListedFile, MissingSettings, ProjectInfo, VerifyProjectResponse};
use crate::supabase::missing_settings;
use axum::{Json, extract::State};
use chrono::Utc;
use tracing::{debug, warn};

const FOLDER_LISTING_LIMIT: u32 = 20;

#[utoipa::path(
    get,
    path = "/verify-project",
    tag = "project",
    summary = "Check backend configuration",
    description = "Report which backend project the service talks to, whether each configured bucket can be listed, \
and which avatar folders hold files. Problems are reported in the body; the call itself always succeeds.",
    responses(
        (status = 200, description = "Check result", body = VerifyProjectResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_project(State(state): State<AppState>) -> Json<VerifyProjectResponse> {
    let supabase = &state.config.supabase;
    let missing = missing_settings(supabase);
    let timestamp = Utc::now();

    let Some(storage) = state.storage.clone().filter(|_| missing.is_empty()) else {
        return Json(VerifyProjectResponse {
            success: false,
            message: "Environment variables not configured".to_string(),
            timestamp,
            missing: Some(MissingSettings {
                supabase_url: supabase.url.is_none(),
                service_role_key: supabase.service_role_key.as_deref().is_none_or(|key| key.trim().is_empty()),
            }),
            project_info: None,
            bucket_access: Vec::new(),
            file_listing: BTreeMap::new(),
        });
    };

    let project_info = supabase.url.as_ref().map(|url| ProjectInfo {
        url: url.to_string(),
        project_id: url.host_str().and_then(|host| host.split('.').next()).map(str::to_string),
    });

    let storage_config = &state.config.storage;
    let mut bucket_access = Vec::new();
    for bucket in [&storage_config.avatar_bucket, &storage_config.documents_bucket] {
        let access = match storage.list(bucket, "", 1, 0).await {
            Ok(_) => BucketAccess {
                name: bucket.clone(),
                accessible: true,
                error: None,
            },
            Err(e) => {
                warn!("Bucket {} is not accessible: {}", bucket, e);
                BucketAccess {
                    name: bucket.clone(),
                    accessible: false,
                    error: Some(e.to_string()),
                }
            }
        };
        bucket_access.push(access);
    }

    let mut folders = vec![
        String::new(),
        storage_config.student_prefix.clone(),
        storage_config.profile_prefix.clone(),
        storage_config.instructor_prefix.clone(),
        storage_config.default_prefix.clone(),
    ];
    folders.sort();
    folders.dedup();

    let mut file_listing = BTreeMap::new();
    for folder in folders {
        match storage.list(&storage_config.avatar_bucket, &folder, FOLDER_LISTING_LIMIT, 0).await {
            Ok(entries) if !entries.is_empty() => {
                let files: Vec<ListedFile> = entries
                    .iter()
                    .map(|entry| ListedFile {
                        name: entry.name.clone(),
                        size: entry.size(),
                        updated: entry.updated_at.clone(),
                    })
                    .collect();
                file_listing.insert(folder, FolderListing { count: files.len(), files });
            }
            Ok(_) => {}
            Err(e) => debug!("Listing folder '{}' failed: {}", folder, e),
        }
    }

    Json(VerifyProjectResponse {
        success: true,
        message: "Project verification complete".to_string(),
        timestamp,
        missing: None,
        project_info,
        bucket_access,
        file_listing,
    })
}

//! Avatar maintenance endpoints used by the dashboard, plus the upload/replace/clear helpers the
//! entity handlers share.

use crate::AppState;
use crate::api::models::avatars::{
    AvatarUrlRequest, DebugAvatarUrlResponse, DeleteAvatarResponse, ExtractionResult, FilePathRequest, ForceDeleteResponse, UrlAnalysis,
    VerifyFileResponse,
};
use crate::avatars::{AvatarCleaner, AvatarRemoval, PathResolver, delete_object};
use crate::db::handlers::Profiles;
use crate::errors::{Error, Result};
use crate::types::{ProfileId, abbrev_uuid};
use axum::{
    Json,
    extract::{Multipart, State},
};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

const NOT_CONFIGURED: &str = "Environment variables not configured";

#[utoipa::path(
    post,
    path = "/delete-avatar-admin",
    tag = "avatars",
    summary = "Delete avatar",
    description = "Resolve a stored avatar reference, delete the object and, when enabled, check the parent directory no longer lists it.

`success` is true only when the object was deleted and the check (if it ran) confirms it is gone.",
    request_body = AvatarUrlRequest,
    responses(
        (status = 200, description = "Outcome of the deletion", body = DeleteAvatarResponse),
        (status = 400, description = "No avatar URL given"),
        (status = 500, description = "Backend credentials not configured")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_avatar_admin(State(state): State<AppState>, Json(request): Json<AvatarUrlRequest>) -> Result<Json<DeleteAvatarResponse>> {
    let avatar_url = request.avatar_url.filter(|url| !url.trim().is_empty()).ok_or_else(|| Error::BadRequest {
        message: "Avatar URL is required".to_string(),
    })?;

    let cleaner = state.avatar_cleaner()?;
    let removal = cleaner.remove(&avatar_url).await;

    Ok(Json(DeleteAvatarResponse::from(removal)))
}

#[utoipa::path(
    post,
    path = "/debug-avatar-url",
    tag = "avatars",
    summary = "Explain avatar URL resolution",
    description = "Report how a stored avatar reference would be resolved, without touching storage.",
    request_body = AvatarUrlRequest,
    responses(
        (status = 200, description = "Resolution diagnostics", body = DebugAvatarUrlResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn debug_avatar_url(State(state): State<AppState>, Json(body): Json<Value>) -> Json<DebugAvatarUrlResponse> {
    let Some(avatar_url) = body.get("avatarUrl").and_then(Value::as_str).filter(|url| !url.is_empty()) else {
        return Json(DebugAvatarUrlResponse {
            success: false,
            message: "No avatar URL received".to_string(),
            url_analysis: None,
            extraction_result: None,
            recommendations: Vec::new(),
            body: Some(body),
        });
    };

    let storage_config = &state.config.storage;
    let resolved = PathResolver::from_config(storage_config).resolve(avatar_url);
    let student_prefix = format!("{}/", storage_config.student_prefix);

    let url_parts: Vec<String> = avatar_url.split('/').map(str::to_string).collect();
    let last_part = url_parts.last().cloned();
    let analysis = UrlAnalysis {
        original_url: avatar_url.to_string(),
        length: avatar_url.len(),
        contains_public_url_marker: avatar_url.contains(&storage_config.public_url_marker),
        contains_path_token: avatar_url.contains(&storage_config.path_token),
        contains_student_prefix: avatar_url.contains(&student_prefix),
        file_extension: last_part
            .as_deref()
            .and_then(|part| part.rsplit_once('.'))
            .map(|(_, ext)| ext.to_lowercase()),
        url_parts,
        last_part,
    };

    let mut recommendations = Vec::new();
    match &resolved {
        None => recommendations.push("Failed to extract the file path".to_string()),
        Some(path) => {
            recommendations.push("File path extracted successfully".to_string());
            if !path.as_str().starts_with(&storage_config.path_token) {
                recommendations.push(format!("Path does not start with \"{}\"", storage_config.path_token));
            }
            if !path.as_str().contains(&student_prefix) {
                recommendations.push(format!("Path does not contain \"{student_prefix}\""));
            }
        }
    }

    Json(DebugAvatarUrlResponse {
        success: true,
        message: "Debug complete".to_string(),
        url_analysis: Some(analysis),
        extraction_result: Some(ExtractionResult::new(resolved.as_ref(), &storage_config.avatar_bucket)),
        recommendations,
        body: None,
    })
}

#[utoipa::path(
    post,
    path = "/verify-file-exists",
    tag = "avatars",
    summary = "Check an object exists",
    description = "Try to download the object; when that fails, look for it in its directory listing.",
    request_body = FilePathRequest,
    responses(
        (status = 200, description = "What was found", body = VerifyFileResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_file_exists(State(state): State<AppState>, Json(request): Json<FilePathRequest>) -> Json<VerifyFileResponse> {
    let Some(file_path) = request.file_path.filter(|p| !p.trim().is_empty()) else {
        return Json(VerifyFileResponse::failure("File path is required"));
    };
    let Ok(cleaner) = state.avatar_cleaner() else {
        return Json(VerifyFileResponse::failure(NOT_CONFIGURED));
    };

    match cleaner.check_exists(&file_path).await {
        Ok(report) => Json(VerifyFileResponse::from(report)),
        Err(e) => Json(VerifyFileResponse {
            file_path: Some(file_path),
            error: Some(e.to_string()),
            ..VerifyFileResponse::failure("Error listing directory")
        }),
    }
}

#[utoipa::path(
    post,
    path = "/force-delete-avatar",
    tag = "avatars",
    summary = "Delete an object and show the listing before and after",
    request_body = FilePathRequest,
    responses(
        (status = 200, description = "Listings and download check around the delete", body = ForceDeleteResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn force_delete_avatar(State(state): State<AppState>, Json(request): Json<FilePathRequest>) -> Json<ForceDeleteResponse> {
    let Some(file_path) = request.file_path.filter(|p| !p.trim().is_empty()) else {
        return Json(ForceDeleteResponse::failure("File path is required"));
    };
    let Ok(cleaner) = state.avatar_cleaner() else {
        return Json(ForceDeleteResponse::failure(NOT_CONFIGURED));
    };

    match cleaner.force_delete(&file_path).await {
        Ok(report) => Json(ForceDeleteResponse::from(report)),
        Err(e) => Json(ForceDeleteResponse::from_error(&file_path, e)),
    }
}

/// An image read from a multipart upload.
#[derive(Debug)]
pub(crate) struct AvatarUpload {
    bytes: Bytes,
    content_type: String,
    extension: String,
}

/// Read the `file` (or `avatar`) field of a multipart body. Only `image/*` content is accepted,
/// and reading stops as soon as `max_size` is exceeded.
pub(crate) async fn read_avatar_upload(multipart: &mut Multipart, max_size: usize) -> Result<AvatarUpload> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        if !matches!(field.name(), Some("file" | "avatar")) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(Error::BadRequest {
                message: "File must be an image".to_string(),
            });
        }
        let extension = file_extension(field.file_name(), &content_type);

        let mut bytes = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read file chunk: {e}"),
        })? {
            if bytes.len() + chunk.len() > max_size {
                return Err(Error::PayloadTooLarge {
                    message: format!("Image exceeds the maximum size of {max_size} bytes"),
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(Error::BadRequest {
                message: "Uploaded file is empty".to_string(),
            });
        }

        return Ok(AvatarUpload {
            bytes: bytes.freeze(),
            content_type,
            extension,
        });
    }

    Err(Error::BadRequest {
        message: "No image file provided".to_string(),
    })
}

/// Extension from the uploaded file name, else the usual one for the content type.
fn file_extension(file_name: Option<&str>, content_type: &str) -> String {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .or_else(|| match content_type {
            "image/jpeg" => Some("jpg".to_string()),
            other => mime_guess::get_mime_extensions_str(other)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string()),
        })
        .unwrap_or_else(|| "img".to_string())
}

/// Store `upload` under `<prefix>/<timestamp>-<uuid>.<ext>`, point the profile at it, and remove
/// the previous image. Returns the new public URL.
pub(crate) async fn replace_profile_avatar(state: &AppState, profile_id: ProfileId, prefix: &str, upload: AvatarUpload) -> Result<String> {
    let storage = state.require_storage()?;
    let bucket = state.config.storage.avatar_bucket.as_str();
    let key = format!(
        "{}/{}-{}.{}",
        prefix.trim_end_matches('/'),
        Utc::now().timestamp_millis(),
        Uuid::new_v4(),
        upload.extension
    );

    let url = storage.upload(bucket, &key, upload.bytes, &upload.content_type).await?;
    info!("Uploaded avatar {} for profile {}", key, abbrev_uuid(&profile_id));

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let previous = match Profiles::new(&mut conn).replace_avatar_url(profile_id, Some(&url)).await {
        Ok(previous) => previous,
        Err(e) => {
            // Nothing references the new object
            if let Err(cleanup) = delete_object(storage.as_ref(), bucket, &key).await {
                warn!("Failed to remove orphaned avatar {}: {}", key, cleanup);
            }
            return Err(e.into());
        }
    };

    if let Some(previous) = previous.filter(|p| p != &url) {
        let cleaner = AvatarCleaner::new(storage, &state.config.storage);
        discard_previous(&cleaner, &previous).await;
    }

    Ok(url)
}

/// Clear the profile's avatar reference and remove the object it pointed to.
pub(crate) async fn clear_profile_avatar(state: &AppState, profile_id: ProfileId) -> Result<Option<AvatarRemoval>> {
    let cleaner = state.avatar_cleaner()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let previous = Profiles::new(&mut conn).replace_avatar_url(profile_id, None).await?;

    match previous {
        Some(previous) => Ok(Some(discard_previous(&cleaner, &previous).await)),
        None => Ok(None),
    }
}

async fn discard_previous(cleaner: &AvatarCleaner, previous: &str) -> AvatarRemoval {
    let removal = cleaner.remove(previous).await;
    if !removal.is_confirmed() {
        warn!("Previous avatar not removed: {}", removal.message);
    }
    removal
}

use crate::AppState;
use crate::api::handlers::avatars::{clear_profile_avatar, read_avatar_upload, replace_profile_avatar};
use crate::api::models::profiles::{ProfileResponse, ProfileUpdate};
use crate::db::handlers::{Profiles, Repository};
use crate::db::models::profiles::{ProfileDBResponse, ProfileUpdateDBRequest};
use crate::deletion::{DeleteType, DeletionReport};
use crate::errors::{Error, Result};
use crate::types::ProfileId;
use axum::{
    Json,
    extract::{Multipart, Path, State},
};

async fn fetch_profile(state: &AppState, id: ProfileId) -> Result<ProfileDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Profiles::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Profile".to_string(),
        id: id.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/profiles/{id}",
    tag = "profiles",
    summary = "Get profile",
    params(("id" = uuid::Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "Profile not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_profile(State(state): State<AppState>, Path(id): Path<ProfileId>) -> Result<Json<ProfileResponse>> {
    Ok(Json(fetch_profile(&state, id).await?.into()))
}

#[utoipa::path(
    patch,
    path = "/profiles/{id}",
    tag = "profiles",
    summary = "Update profile",
    params(("id" = uuid::Uuid, Path, description = "Profile ID")),
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Profile not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<ProfileId>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let request = ProfileUpdateDBRequest::from(update);
    if request.is_empty() {
        return get_profile(State(state), Path(id)).await;
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let profile = Profiles::new(&mut conn).update(id, &request).await?;

    Ok(Json(profile.into()))
}

#[utoipa::path(
    delete,
    path = "/profiles/{id}",
    tag = "profiles",
    summary = "Delete profile",
    description = "Delete the profile together with any student or instructor records it owns and its identity account.",
    params(("id" = uuid::Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Deletion report", body = DeletionReport),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_profile(State(state): State<AppState>, Path(id): Path<ProfileId>) -> Result<Json<DeletionReport>> {
    let report = state.entity_deleter()?.delete_user(id, DeleteType::User).await?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/profiles/{id}/avatar",
    tag = "profiles",
    summary = "Upload profile avatar",
    params(("id" = uuid::Uuid, Path, description = "Profile ID")),
    request_body(content_type = "multipart/form-data", description = "Image file in the `file` field"),
    responses(
        (status = 200, description = "Profile with the new avatar", body = ProfileResponse),
        (status = 400, description = "Missing or non-image file"),
        (status = 404, description = "Profile not found"),
        (status = 413, description = "Image too large")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_profile_avatar(
    State(state): State<AppState>,
    Path(id): Path<ProfileId>,
    mut multipart: Multipart,
) -> Result<Json<ProfileResponse>> {
    fetch_profile(&state, id).await?;
    let upload = read_avatar_upload(&mut multipart, state.config.storage.max_avatar_size).await?;
    replace_profile_avatar(&state, id, &state.config.storage.profile_prefix, upload).await?;

    Ok(Json(fetch_profile(&state, id).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/profiles/{id}/avatar",
    tag = "profiles",
    summary = "Remove profile avatar",
    params(("id" = uuid::Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Profile without avatar", body = ProfileResponse),
        (status = 404, description = "Profile not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn remove_profile_avatar(State(state): State<AppState>, Path(id): Path<ProfileId>) -> Result<Json<ProfileResponse>> {
    clear_profile_avatar(&state, id).await?;
    Ok(Json(fetch_profile(&state, id).await?.into()))
}

use crate::AppState;
use crate::api::handlers::avatars::{clear_profile_avatar, read_avatar_upload, replace_profile_avatar};
use crate::api::handlers::users::{NewAccount, provision_account, release_account};
use crate::api::models::instructors::{InstructorCreate, InstructorResponse, InstructorStatus, InstructorUpdate, ListInstructorsQuery};
use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::profiles::Role;
use crate::db::handlers::{Instructors, Profiles, Repository, instructors::InstructorFilter};
use crate::db::models::instructors::{InstructorCreateDBRequest, InstructorDBResponse, InstructorUpdateDBRequest};
use crate::db::models::profiles::ProfileUpdateDBRequest;
use crate::deletion::DeletionReport;
use crate::errors::{Error, Result};
use crate::types::InstructorId;
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};

fn instructor_not_found(id: InstructorId) -> Error {
    Error::NotFound {
        resource: "Instructor".to_string(),
        id: id.to_string(),
    }
}

async fn fetch_instructor(state: &AppState, id: InstructorId) -> Result<InstructorDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Instructors::new(&mut conn).get_by_id(id).await?.ok_or_else(|| instructor_not_found(id))
}

#[utoipa::path(
    get,
    path = "/instructors",
    tag = "instructors",
    summary = "List instructors",
    params(ListInstructorsQuery),
    responses(
        (status = 200, description = "Page of instructors", body = PaginatedResponse<InstructorResponse>),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_instructors(
    State(state): State<AppState>,
    Query(query): Query<ListInstructorsQuery>,
) -> Result<Json<PaginatedResponse<InstructorResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();
    let filter = InstructorFilter {
        status: query.status,
        search: query.search.filter(|s| !s.trim().is_empty()),
        ..InstructorFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Instructors::new(&mut conn);
    let instructors = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        instructors.into_iter().map(InstructorResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/instructors",
    tag = "instructors",
    summary = "Invite instructor",
    description = "Create the identity account, the profile and the instructor record. The account signs in as the \
instructor, so `auth_user_id` is the profile id.",
    request_body = InstructorCreate,
    responses(
        (status = 201, description = "Instructor created", body = InstructorResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email address already in use"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_instructor(
    State(state): State<AppState>,
    Json(create): Json<InstructorCreate>,
) -> Result<(StatusCode, Json<InstructorResponse>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let profile = provision_account(
        &state,
        &mut tx,
        &NewAccount {
            name: &create.name,
            email: &create.email,
            phone: create.phone.as_deref(),
            role: Role::Instructor,
        },
    )
    .await?;

    let request = InstructorCreateDBRequest {
        profile_id: profile.id,
        auth_user_id: Some(profile.id),
        license: create.license,
        functions: create.functions,
        specialties: create.specialties,
        status: create.status.unwrap_or(InstructorStatus::Invited),
        hired_date: create.hired_date,
    };

    let instructor = match Instructors::new(&mut tx).create(&request).await {
        Ok(instructor) => instructor,
        Err(e) => {
            drop(tx);
            release_account(&state, profile.id).await;
            return Err(e.into());
        }
    };
    if let Err(e) = tx.commit().await {
        release_account(&state, profile.id).await;
        return Err(Error::Database(e.into()));
    }

    Ok((StatusCode::CREATED, Json(InstructorResponse::from(instructor))))
}

#[utoipa::path(
    get,
    path = "/instructors/{id}",
    tag = "instructors",
    summary = "Get instructor",
    params(("id" = uuid::Uuid, Path, description = "Instructor ID")),
    responses(
        (status = 200, description = "Instructor", body = InstructorResponse),
        (status = 404, description = "Instructor not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_instructor(State(state): State<AppState>, Path(id): Path<InstructorId>) -> Result<Json<InstructorResponse>> {
    Ok(Json(fetch_instructor(&state, id).await?.into()))
}

#[utoipa::path(
    patch,
    path = "/instructors/{id}",
    tag = "instructors",
    summary = "Update instructor",
    params(("id" = uuid::Uuid, Path, description = "Instructor ID")),
    request_body = InstructorUpdate,
    responses(
        (status = 200, description = "Updated instructor", body = InstructorResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Instructor not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_instructor(
    State(state): State<AppState>,
    Path(id): Path<InstructorId>,
    Json(update): Json<InstructorUpdate>,
) -> Result<Json<InstructorResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let existing = Instructors::new(&mut tx)
        .get_by_id(id)
        .await?
        .ok_or_else(|| instructor_not_found(id))?;

    let profile_update = ProfileUpdateDBRequest {
        name: update.name.clone(),
        phone: update.phone.clone(),
        ..Default::default()
    };
    if !profile_update.is_empty() {
        Profiles::new(&mut tx).update(existing.profile_id, &profile_update).await?;
    }

    let instructor = Instructors::new(&mut tx).update(id, &InstructorUpdateDBRequest::from(&update)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(instructor.into()))
}

#[utoipa::path(
    delete,
    path = "/instructors/{id}",
    tag = "instructors",
    summary = "Delete instructor",
    description = "Remove the avatar, specialties, lessons, classes, the instructor record, its profile and its \
identity account. Assigned students are unassigned, not deleted.",
    params(("id" = uuid::Uuid, Path, description = "Instructor ID")),
    responses(
        (status = 200, description = "Deletion report", body = DeletionReport),
        (status = 404, description = "Instructor not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_instructor(State(state): State<AppState>, Path(id): Path<InstructorId>) -> Result<Json<DeletionReport>> {
    let report = state.entity_deleter()?.delete_instructor(id).await?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/instructors/{id}/avatar",
    tag = "instructors",
    summary = "Upload instructor avatar",
    params(("id" = uuid::Uuid, Path, description = "Instructor ID")),
    request_body(content_type = "multipart/form-data", description = "Image file in the `file` field"),
    responses(
        (status = 200, description = "Instructor with the new avatar", body = InstructorResponse),
        (status = 400, description = "Missing or non-image file"),
        (status = 404, description = "Instructor not found"),
        (status = 413, description = "Image too large")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_instructor_avatar(
    State(state): State<AppState>,
    Path(id): Path<InstructorId>,
    mut multipart: Multipart,
) -> Result<Json<InstructorResponse>> {
    let instructor = fetch_instructor(&state, id).await?;
    let upload = read_avatar_upload(&mut multipart, state.config.storage.max_avatar_size).await?;
    replace_profile_avatar(&state, instructor.profile_id, &state.config.storage.instructor_prefix, upload).await?;

    Ok(Json(fetch_instructor(&state, id).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/instructors/{id}/avatar",
    tag = "instructors",
    summary = "Remove instructor avatar",
    params(("id" = uuid::Uuid, Path, description = "Instructor ID")),
    responses(
        (status = 200, description = "Instructor without avatar", body = InstructorResponse),
        (status = 404, description = "Instructor not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn remove_instructor_avatar(State(state): State<AppState>, Path(id): Path<InstructorId>) -> Result<Json<InstructorResponse>> {
    let instructor = fetch_instructor(&state, id).await?;
    clear_profile_avatar(&state, instructor.profile_id).await?;

    Ok(Json(fetch_instructor(&state, id).await?.into()))
}

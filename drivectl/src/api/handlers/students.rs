use crate::AppState;
use crate::api::handlers::avatars::{clear_profile_avatar, read_avatar_upload, replace_profile_avatar};
use crate::api::handlers::users::{NewAccount, provision_account, release_account};
use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::profiles::Role;
use crate::api::models::students::{ListStudentsQuery, StudentCreate, StudentResponse, StudentUpdate};
use crate::db::handlers::{Profiles, Repository, Students, students::StudentFilter};
use crate::db::models::profiles::ProfileUpdateDBRequest;
use crate::db::models::students::{StudentCreateDBRequest, StudentDBResponse, StudentUpdateDBRequest};
use crate::deletion::DeletionReport;
use crate::errors::{Error, Result};
use crate::types::StudentId;
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};

fn student_not_found(id: StudentId) -> Error {
    Error::NotFound {
        resource: "Student".to_string(),
        id: id.to_string(),
    }
}

async fn fetch_student(state: &AppState, id: StudentId) -> Result<StudentDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Students::new(&mut conn).get_by_id(id).await?.ok_or_else(|| student_not_found(id))
}

#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    summary = "List students",
    params(ListStudentsQuery),
    responses(
        (status = 200, description = "Page of students", body = PaginatedResponse<StudentResponse>),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_students(State(state): State<AppState>, Query(query): Query<ListStudentsQuery>) -> Result<Json<PaginatedResponse<StudentResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();
    let filter = StudentFilter {
        status: query.status,
        instructor_id: query.instructor_id,
        search: query.search.filter(|s| !s.trim().is_empty()),
        ..StudentFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Students::new(&mut conn);
    let students = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        students.into_iter().map(StudentResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/students",
    tag = "students",
    summary = "Enroll student",
    description = "Create the identity account, the profile and the student record. The profile starts in \
`pending_first_login`. If the student record cannot be created the account is removed again.",
    request_body = StudentCreate,
    responses(
        (status = 201, description = "Student enrolled", body = StudentResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email address already in use"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_student(State(state): State<AppState>, Json(create): Json<StudentCreate>) -> Result<(StatusCode, Json<StudentResponse>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let profile = provision_account(
        &state,
        &mut tx,
        &NewAccount {
            name: &create.name,
            email: &create.email,
            phone: create.phone.as_deref(),
            role: Role::Student,
        },
    )
    .await?;

    let defaults = StudentCreateDBRequest::new(profile.id);
    let request = StudentCreateDBRequest {
        license_category_id: create.license_category_id,
        license_category_ids: create.license_category_ids,
        instructor_id: create.instructor_id,
        status: create.status.unwrap_or(defaults.status),
        payment_status: create.payment_status.unwrap_or(defaults.payment_status),
        access_status: create.access_status.unwrap_or(defaults.access_status),
        enrollment_date: create.enrollment_date,
        total_lessons: create.total_lessons.unwrap_or(defaults.total_lessons),
        country_code: create.country_code.unwrap_or(defaults.country_code),
        profile_id: profile.id,
    };

    let student = match Students::new(&mut tx).create(&request).await {
        Ok(student) => student,
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

    Ok((StatusCode::CREATED, Json(StudentResponse::from(student))))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    summary = "Get student",
    params(("id" = uuid::Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student", body = StudentResponse),
        (status = 404, description = "Student not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_student(State(state): State<AppState>, Path(id): Path<StudentId>) -> Result<Json<StudentResponse>> {
    Ok(Json(fetch_student(&state, id).await?.into()))
}

#[utoipa::path(
    patch,
    path = "/students/{id}",
    tag = "students",
    summary = "Update student",
    description = "Update profile fields (`name`, `phone`) and student fields together. Only provided fields change.",
    params(("id" = uuid::Uuid, Path, description = "Student ID")),
    request_body = StudentUpdate,
    responses(
        (status = 200, description = "Updated student", body = StudentResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Student not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    Json(update): Json<StudentUpdate>,
) -> Result<Json<StudentResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let existing = Students::new(&mut tx).get_by_id(id).await?.ok_or_else(|| student_not_found(id))?;

    let profile_update = ProfileUpdateDBRequest {
        name: update.name.clone(),
        phone: update.phone.clone(),
        ..Default::default()
    };
    if !profile_update.is_empty() {
        Profiles::new(&mut tx).update(existing.profile_id, &profile_update).await?;
    }

    let student = Students::new(&mut tx).update(id, &StudentUpdateDBRequest::from(&update)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(student.into()))
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "students",
    summary = "Delete student",
    description = "Remove the avatar, dependent rows, the student record, its profile and its identity account. \
Only a failure to delete the student record fails the request; other failures are listed in `warnings`.",
    params(("id" = uuid::Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Deletion report", body = DeletionReport),
        (status = 404, description = "Student not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_student(State(state): State<AppState>, Path(id): Path<StudentId>) -> Result<Json<DeletionReport>> {
    let report = state.entity_deleter()?.delete_student(id).await?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/students/{id}/avatar",
    tag = "students",
    summary = "Upload student avatar",
    description = "Upload an image in the `file` field of a multipart body. The previous avatar is removed from storage.",
    params(("id" = uuid::Uuid, Path, description = "Student ID")),
    request_body(content_type = "multipart/form-data", description = "Image file in the `file` field"),
    responses(
        (status = 200, description = "Student with the new avatar", body = StudentResponse),
        (status = 400, description = "Missing or non-image file"),
        (status = 404, description = "Student not found"),
        (status = 413, description = "Image too large")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_student_avatar(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    mut multipart: Multipart,
) -> Result<Json<StudentResponse>> {
    let student = fetch_student(&state, id).await?;
    let upload = read_avatar_upload(&mut multipart, state.config.storage.max_avatar_size).await?;
    replace_profile_avatar(&state, student.profile_id, &state.config.storage.student_prefix, upload).await?;

    Ok(Json(fetch_student(&state, id).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/students/{id}/avatar",
    tag = "students",
    summary = "Remove student avatar",
    params(("id" = uuid::Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student without avatar", body = StudentResponse),
        (status = 404, description = "Student not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn remove_student_avatar(State(state): State<AppState>, Path(id): Path<StudentId>) -> Result<Json<StudentResponse>> {
    let student = fetch_student(&state, id).await?;
    clear_profile_avatar(&state, student.profile_id).await?;

    Ok(Json(fetch_student(&state, id).await?.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::students::{StudentResponse, StudentStatus};
    use crate::identity::fake::FakeIdentity;
    use crate::storage::memory::MemoryStorage;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::{Value, json};
    use sqlx::PgPool;
    use uuid::Uuid;

    fn image_form(bytes: Vec<u8>, file_name: &str, mime_type: &str) -> MultipartForm {
        MultipartForm::new().add_part("file", Part::bytes(bytes).file_name(file_name).mime_type(mime_type))
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_students_with_search_and_pagination(pool: PgPool) {
        create_test_student(&pool, "ana@example.com", None).await;
        create_test_student(&pool, "bia@example.com", None).await;
        create_test_student(&pool, "carla@example.com", None).await;
        let app = create_test_app(pool).await;

        let response = app.server.get("/admin/api/v1/students?limit=2").await;
        response.assert_status_ok();
        let page: PaginatedResponse<StudentResponse> = response.json();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].name, "ana");

        let response = app.server.get("/admin/api/v1/students?search=BIA").await;
        let page: PaginatedResponse<StudentResponse> = response.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].email, "bia@example.com");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_student(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let category_b = license_category_id(&pool, "B").await;

        let response = app
            .server
            .post("/admin/api/v1/students")
            .json(&json!({
                "name": "Ana Souza",
                "email": "ana@example.com",
                "phone": "+55 11 99999-0000",
                "license_category_id": category_b,
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let student: StudentResponse = response.json();
        assert_eq!(student.name, "Ana Souza");
        assert_eq!(student.status, StudentStatus::Enrolled);
        assert_eq!(student.license_category_code.as_deref(), Some("B"));
        assert_eq!(student.license_category_ids, vec![category_b]);

        let created = app.identity.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].email, "ana@example.com");
        assert_eq!(created[0].password, "initial-password");
        assert_eq!(created[0].user_metadata["role"], "student");
        assert!(profile_exists(&pool, student.profile_id).await);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_student_rejects_invalid_email(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app
            .server
            .post("/admin/api/v1/students")
            .json(&json!({ "name": "Ana", "email": "not-an-email" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(app.identity.created.lock().unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_student_releases_account_when_record_fails(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .server
            .post("/admin/api/v1/students")
            .json(&json!({
                "name": "Ana",
                "email": "ana@example.com",
                "license_category_id": Uuid::new_v4(),
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(app.identity.deleted.lock().unwrap().len(), 1);
        let profiles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles").fetch_one(&pool).await.unwrap();
        assert_eq!(profiles, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_missing_student(pool: PgPool) {
        let app = create_test_app(pool).await;
        let id = Uuid::new_v4();

        let response = app.server.get(&format!("/admin/api/v1/students/{id}")).await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": format!("Student with ID {id} not found") }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_student_profile_and_record(pool: PgPool) {
        let student = create_test_student(&pool, "ana@example.com", None).await;
        let app = create_test_app(pool).await;

        let response = app
            .server
            .patch(&format!("/admin/api/v1/students/{}", student.id))
            .json(&json!({ "name": "Ana Souza", "status": "in_progress", "progress": 40 }))
            .await;

        response.assert_status_ok();
        let updated: StudentResponse = response.json();
        assert_eq!(updated.name, "Ana Souza");
        assert_eq!(updated.status, StudentStatus::InProgress);
        assert_eq!(updated.progress, 40);
        assert_eq!(updated.email, "ana@example.com");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_student_clears_nullable_fields(pool: PgPool) {
        let student = create_test_student(&pool, "ana@example.com", None).await;
        let instructor = create_test_instructor(&pool, "carlos@example.com", None).await;
        let app = create_test_app(pool).await;
        let url = format!("/admin/api/v1/students/{}", student.id);

        let response = app
            .server
            .patch(&url)
            .json(&json!({ "instructor_id": instructor.id, "phone": "+55 11 97777-0000" }))
            .await;
        response.assert_status_ok();
        let assigned: StudentResponse = response.json();
        assert_eq!(assigned.instructor_id, Some(instructor.id));
        assert_eq!(assigned.phone.as_deref(), Some("+55 11 97777-0000"));

        // Absent fields are left alone
        let response = app.server.patch(&url).json(&json!({ "progress": 10 })).await;
        response.assert_status_ok();
        let unchanged: StudentResponse = response.json();
        assert_eq!(unchanged.instructor_id, Some(instructor.id));
        assert!(unchanged.license_category_id.is_some());

        let response = app
            .server
            .patch(&url)
            .json(&json!({ "instructor_id": null, "phone": null, "license_category_id": null }))
            .await;
        response.assert_status_ok();
        let cleared: StudentResponse = response.json();
        assert_eq!(cleared.instructor_id, None);
        assert_eq!(cleared.phone, None);
        assert_eq!(cleared.license_category_id, None);
        assert_eq!(cleared.progress, 10);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_student(pool: PgPool) {
        let avatar_url = format!("{AVATAR_URL_PREFIX}student-avatars/ana.png");
        let student = create_test_student(&pool, "ana@example.com", Some(&avatar_url)).await;
        let app = create_test_app_with(
            pool.clone(),
            MemoryStorage::new().with_object("avatars", "student-avatars/ana.png"),
            FakeIdentity::default(),
        );

        let response = app.server.delete(&format!("/admin/api/v1/students/{}", student.id)).await;

        response.assert_status_ok();
        let report: Value = response.json();
        assert_eq!(report["avatarDeleted"], true);
        assert_eq!(report["studentDataDeleted"], true);
        assert_eq!(report["profileDeleted"], true);
        assert_eq!(report["authDeleted"], true);
        assert!(!profile_exists(&pool, student.profile_id).await);
        assert!(!app.storage.contains("avatars", "student-avatars/ana.png"));

        let response = app.server.delete(&format!("/admin/api/v1/students/{}", student.id)).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_student_avatar_replaces_previous(pool: PgPool) {
        let old_url = format!("{AVATAR_URL_PREFIX}student-avatars/old.png");
        let student = create_test_student(&pool, "ana@example.com", Some(&old_url)).await;
        let app = create_test_app_with(
            pool,
            MemoryStorage::new().with_object("avatars", "student-avatars/old.png"),
            FakeIdentity::default(),
        );

        let response = app
            .server
            .post(&format!("/admin/api/v1/students/{}/avatar", student.id))
            .multipart(image_form(vec![7u8; 512], "Photo.PNG", "image/png"))
            .await;

        response.assert_status_ok();
        let updated: StudentResponse = response.json();
        let new_url = updated.avatar_url.expect("avatar should be set");
        let key = new_url.strip_prefix(AVATAR_URL_PREFIX).expect("public URL of the avatar bucket");
        assert!(key.starts_with("student-avatars/"), "{key}");
        assert!(key.ends_with(".png"), "{key}");
        assert!(app.storage.contains("avatars", key));
        assert!(!app.storage.contains("avatars", "student-avatars/old.png"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_student_avatar_validation(pool: PgPool) {
        let student = create_test_student(&pool, "ana@example.com", None).await;
        let app = create_test_app(pool).await;
        let url = format!("/admin/api/v1/students/{}/avatar", student.id);

        let response = app.server.post(&url).multipart(image_form(vec![1u8; 2048], "big.png", "image/png")).await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let response = app
            .server
            .post(&url)
            .multipart(image_form(b"hello".to_vec(), "notes.txt", "text/plain"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "File must be an image" }));

        let response = app.server.post(&url).multipart(MultipartForm::new().add_text("name", "ana")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "No image file provided" }));

        let response = app
            .server
            .post(&format!("/admin/api/v1/students/{}/avatar", Uuid::new_v4()))
            .multipart(image_form(vec![7u8; 16], "a.png", "image/png"))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_remove_student_avatar(pool: PgPool) {
        let avatar_url = format!("{AVATAR_URL_PREFIX}student-avatars/ana.png");
        let student = create_test_student(&pool, "ana@example.com", Some(&avatar_url)).await;
        let app = create_test_app_with(
            pool,
            MemoryStorage::new().with_object("avatars", "student-avatars/ana.png"),
            FakeIdentity::default(),
        );

        let response = app.server.delete(&format!("/admin/api/v1/students/{}/avatar", student.id)).await;

        response.assert_status_ok();
        let updated: StudentResponse = response.json();
        assert_eq!(updated.avatar_url, None);
        assert!(!app.storage.contains("avatars", "student-avatars/ana.png"));
    }
}

//! Orchestrated deletion of students, instructors and whole user accounts.
//!
//! Every deletion runs the same sequence:
//!
//! 1. Remove the avatar object (resolve, delete, verify).
//! 2. Remove dependent rows one by one.
//! 3. Remove the primary row.
//! 4. Remove the owning profile (student and instructor deletions only).
//! 5. Remove the identity account.
//!
//! Only step 3 can fail the operation. Every other failure is logged and recorded as a warning in
//! the [`DeletionReport`], and the sequence carries on. Steps run on one pooled connection without
//! a surrounding transaction: a failed primary delete leaves whatever the earlier steps removed
//! removed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::avatars::AvatarCleaner;
use crate::config::StorageConfig;
use crate::db::handlers::{Instructors, Profiles, Repository, Students};
use crate::errors::{Error, Result};
use crate::identity::{IdentityAdmin, IdentityError};
use crate::storage::{ObjectStorage, StorageError};
use crate::types::{InstructorId, ProfileId, StudentId, abbrev_uuid};

/// Which records a user-level deletion removes besides the profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeleteType {
    /// Student and instructor records
    #[default]
    User,
    Student,
    Instructor,
}

impl DeleteType {
    fn includes_student(self) -> bool {
        matches!(self, DeleteType::User | DeleteType::Student)
    }

    fn includes_instructor(self) -> bool {
        matches!(self, DeleteType::User | DeleteType::Instructor)
    }
}

/// Per-step outcome of a deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub avatar_deleted: bool,
    /// No dependent-row step failed
    pub related_data_deleted: bool,
    pub student_data_deleted: bool,
    pub instructor_data_deleted: bool,
    pub profile_deleted: bool,
    pub auth_deleted: bool,
    /// One entry per step that failed without aborting the deletion
    pub warnings: Vec<String>,
}

impl DeletionReport {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

fn not_found(resource: &str, id: Uuid) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

/// Runs entity deletions against the database, object storage and identity service.
#[derive(Clone)]
pub struct EntityDeleter {
    pool: PgPool,
    cleaner: AvatarCleaner,
    storage: Arc<dyn ObjectStorage>,
    documents_bucket: String,
    identity: Arc<dyn IdentityAdmin>,
}

impl EntityDeleter {
    pub fn new(pool: PgPool, storage: Arc<dyn ObjectStorage>, identity: Arc<dyn IdentityAdmin>, config: &StorageConfig) -> Self {
        Self {
            pool,
            cleaner: AvatarCleaner::new(storage.clone(), config),
            storage,
            documents_bucket: config.documents_bucket.clone(),
            identity,
        }
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool.acquire().await.map_err(|e| Error::Database(e.into()))
    }

    /// Delete a student record, its dependents, its profile and its identity account.
    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_student(&self, id: StudentId) -> Result<DeletionReport> {
        let mut conn = self.acquire().await?;
        let student = Students::new(&mut conn)
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("Student", id))?;

        let mut report = DeletionReport::default();
        self.remove_avatar(student.avatar_url.as_deref(), &mut report).await;
        report.related_data_deleted = self.remove_student_dependents(&mut conn, id, &mut report).await;

        if !Students::new(&mut conn).delete(id).await? {
            return Err(not_found("Student", id));
        }
        report.student_data_deleted = true;

        self.remove_profile(&mut conn, student.profile_id, &mut report).await;
        self.remove_identity(student.profile_id, &mut report).await;

        info!("Deleted student {} with {} warning(s)", abbrev_uuid(&id), report.warnings.len());
        Ok(report)
    }

    /// Delete an instructor record, its dependents, its profile and its identity account.
    /// Students assigned to the instructor are unassigned, not deleted.
    #[instrument(skip(self), fields(instructor_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_instructor(&self, id: InstructorId) -> Result<DeletionReport> {
        let mut conn = self.acquire().await?;
        let instructor = Instructors::new(&mut conn)
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("Instructor", id))?;

        let mut report = DeletionReport::default();
        self.remove_avatar(instructor.avatar_url.as_deref(), &mut report).await;
        report.related_data_deleted = self.remove_instructor_dependents(&mut conn, id, &mut report).await;

        if !Instructors::new(&mut conn).delete(id).await? {
            return Err(not_found("Instructor", id));
        }
        report.instructor_data_deleted = true;

        self.remove_profile(&mut conn, instructor.profile_id, &mut report).await;
        self.remove_identity(instructor.auth_user_id.unwrap_or(instructor.profile_id), &mut report)
            .await;

        info!("Deleted instructor {} with {} warning(s)", abbrev_uuid(&id), report.warnings.len());
        Ok(report)
    }

    /// Delete a user account: the records `delete_type` selects, then the profile, then the
    /// identity account.
    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn delete_user(&self, profile_id: ProfileId, delete_type: DeleteType) -> Result<DeletionReport> {
        let mut conn = self.acquire().await?;
        let profile = Profiles::new(&mut conn)
            .get_by_id(profile_id)
            .await?
            .ok_or_else(|| not_found("User", profile_id))?;

        let mut report = DeletionReport::default();
        self.remove_avatar(profile.avatar_url.as_deref(), &mut report).await;

        let mut related_ok = true;
        if delete_type.includes_student() {
            match Students::new(&mut conn).get_by_profile_id(profile_id).await {
                Ok(Some(student)) => {
                    related_ok &= self.remove_student_dependents(&mut conn, student.id, &mut report).await;
                    match Students::new(&mut conn).delete(student.id).await {
                        Ok(_) => report.student_data_deleted = true,
                        Err(e) => {
                            report.warn(format!("Student record: {}", e.backend_message()));
                            related_ok = false;
                        }
                    }
                }
                Ok(None) => debug!("Profile owns no student record"),
                Err(e) => {
                    report.warn(format!("Student lookup: {}", e.backend_message()));
                    related_ok = false;
                }
            }
        }

        if delete_type.includes_instructor() {
            match Instructors::new(&mut conn).get_by_profile_id(profile_id).await {
                Ok(Some(instructor)) => {
                    related_ok &= self
                        .remove_instructor_dependents(&mut conn, instructor.id, &mut report)
                        .await;
                    match Instructors::new(&mut conn).delete(instructor.id).await {
                        Ok(_) => report.instructor_data_deleted = true,
                        Err(e) => {
                            report.warn(format!("Instructor record: {}", e.backend_message()));
                            related_ok = false;
                        }
                    }
                }
                Ok(None) => debug!("Profile owns no instructor record"),
                Err(e) => {
                    report.warn(format!("Instructor lookup: {}", e.backend_message()));
                    related_ok = false;
                }
            }
        }
        report.related_data_deleted = related_ok;

        if !Profiles::new(&mut conn).delete(profile_id).await? {
            return Err(not_found("User", profile_id));
        }
        report.profile_deleted = true;

        self.remove_identity(profile_id, &mut report).await;

        info!("Deleted user {} with {} warning(s)", abbrev_uuid(&profile_id), report.warnings.len());
        Ok(report)
    }

    async fn remove_avatar(&self, avatar_url: Option<&str>, report: &mut DeletionReport) {
        let Some(reference) = avatar_url.filter(|r| !r.trim().is_empty()) else {
            debug!("No avatar to remove");
            return;
        };

        let removal = self.cleaner.remove(reference).await;
        report.avatar_deleted = removal.deleted;
        if !removal.is_confirmed() {
            report.warn(format!("Avatar: {}", removal.message));
        }
    }

    async fn remove_student_dependents(&self, conn: &mut PgConnection, id: StudentId, report: &mut DeletionReport) -> bool {
        let mut ok = true;
        let mut students = Students::new(conn);

        if let Err(e) = students.delete_license_links(id).await {
            report.warn(format!("License category links: {}", e.backend_message()));
            ok = false;
        }

        match students.enrollment_document_paths(id).await {
            Ok(paths) => {
                let paths: Vec<String> = paths.into_iter().filter(|p| !p.trim().is_empty()).collect();
                if !paths.is_empty() {
                    match self.storage.remove(&self.documents_bucket, &paths).await {
                        Ok(()) | Err(StorageError::NotFound { .. }) => {
                            debug!("Removed {} enrollment document object(s)", paths.len())
                        }
                        Err(e) => {
                            report.warn(format!("Enrollment document files: {e}"));
                            ok = false;
                        }
                    }
                }
            }
            Err(e) => {
                report.warn(format!("Enrollment document lookup: {}", e.backend_message()));
                ok = false;
            }
        }

        if let Err(e) = students.delete_enrollment_documents(id).await {
            report.warn(format!("Enrollment documents: {}", e.backend_message()));
            ok = false;
        }

        if let Err(e) = students.delete_lessons(id).await {
            report.warn(format!("Lessons: {}", e.backend_message()));
            ok = false;
        }

        ok
    }

    async fn remove_instructor_dependents(
        &self,
        conn: &mut PgConnection,
        id: InstructorId,
        report: &mut DeletionReport,
    ) -> bool {
        let mut ok = true;
        let mut instructors = Instructors::new(conn);

        if let Err(e) = instructors.delete_specialties(id).await {
            report.warn(format!("Specialties: {}", e.backend_message()));
            ok = false;
        }

        if let Err(e) = instructors.delete_lessons(id).await {
            report.warn(format!("Lessons: {}", e.backend_message()));
            ok = false;
        }

        if let Err(e) = instructors.delete_classes(id).await {
            report.warn(format!("Classes: {}", e.backend_message()));
            ok = false;
        }

        ok
    }

    async fn remove_profile(&self, conn: &mut PgConnection, profile_id: ProfileId, report: &mut DeletionReport) {
        match Profiles::new(conn).delete(profile_id).await {
            Ok(true) => report.profile_deleted = true,
            Ok(false) => report.warn(format!("Profile {} was already absent", abbrev_uuid(&profile_id))),
            Err(e) => report.warn(format!("Profile: {}", e.backend_message())),
        }
    }

    async fn remove_identity(&self, user_id: Uuid, report: &mut DeletionReport) {
        match self.identity.delete_user(user_id).await {
            Ok(()) => report.auth_deleted = true,
            Err(IdentityError::NotFound { .. }) => {
                report.warn(format!("Identity account {} was already absent", abbrev_uuid(&user_id)))
            }
            Err(e) => report.warn(format!("Identity account: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::instructors::{InstructorFunction, InstructorStatus};
    use crate::api::models::profiles::{ProfileStatus, Role};
    use crate::db::errors::DbError;
    use crate::db::models::instructors::InstructorCreateDBRequest;
    use crate::db::models::profiles::ProfileCreateDBRequest;
    use crate::db::models::students::StudentCreateDBRequest;
    use crate::identity::fake::FakeIdentity;
    use crate::storage::memory::MemoryStorage;
    use std::time::Duration;

    const AVATAR_URL: &str = "http://storage.test/storage/v1/object/public/avatars/student-avatars/ana.png";
    const AVATAR_KEY: &str = "student-avatars/ana.png";

    fn storage_config() -> StorageConfig {
        StorageConfig {
            settle_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn deleter(pool: &PgPool, storage: &Arc<MemoryStorage>, identity: &Arc<FakeIdentity>) -> EntityDeleter {
        EntityDeleter::new(pool.clone(), storage.clone(), identity.clone(), &storage_config())
    }

    async fn create_profile(pool: &PgPool, email: &str, role: Role, avatar_url: Option<&str>) -> ProfileId {
        let mut conn = pool.acquire().await.unwrap();
        Profiles::new(&mut conn)
            .create(&ProfileCreateDBRequest {
                id: Some(Uuid::new_v4()),
                email: email.to_string(),
                name: email.split('@').next().unwrap_or_default().to_string(),
                role,
                phone: None,
                avatar_url: avatar_url.map(str::to_string),
                status: ProfileStatus::Active,
            })
            .await
            .unwrap()
            .id
    }

    async fn create_student(pool: &PgPool, profile_id: ProfileId) -> StudentId {
        let mut conn = pool.acquire().await.unwrap();
        let category_id: Uuid = sqlx::query_scalar("SELECT id FROM license_categories WHERE code = 'B'")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        let student = Students::new(&mut conn)
            .create(&StudentCreateDBRequest {
                license_category_id: Some(category_id),
                ..StudentCreateDBRequest::new(profile_id)
            })
            .await
            .unwrap();

        sqlx::query("INSERT INTO enrollment_documents (student_id, file_path, document_type) VALUES ($1, $2, 'rg')")
            .bind(student.id)
            .bind(format!("{}/rg.pdf", student.id))
            .execute(&mut *conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO lessons (student_id, lesson_type, scheduled_at) VALUES ($1, 'theoretical', NOW())")
            .bind(student.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        student.id
    }

    async fn create_instructor(pool: &PgPool, profile_id: ProfileId) -> InstructorId {
        let mut conn = pool.acquire().await.unwrap();
        let instructor = Instructors::new(&mut conn)
            .create(&InstructorCreateDBRequest {
                profile_id,
                auth_user_id: Some(profile_id),
                license: None,
                functions: vec![InstructorFunction::Theoretical],
                specialties: vec!["Traffic law".to_string()],
                status: InstructorStatus::Active,
                hired_date: None,
            })
            .await
            .unwrap();

        sqlx::query("INSERT INTO classes (instructor_id, name, scheduled_at) VALUES ($1, 'Defensive driving', NOW())")
            .bind(instructor.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        instructor.id
    }

    async fn row_count(pool: &PgPool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_student_removes_everything(pool: PgPool) {
        let profile_id = create_profile(&pool, "ana@example.com", Role::Student, Some(AVATAR_URL)).await;
        let student_id = create_student(&pool, profile_id).await;
        let document_key = format!("{student_id}/rg.pdf");

        let storage = Arc::new(
            MemoryStorage::new()
                .with_object("avatars", AVATAR_KEY)
                .with_object("enrollment-documents", &document_key),
        );
        let identity = Arc::new(FakeIdentity::default());

        let report = deleter(&pool, &storage, &identity).delete_student(student_id).await.unwrap();

        assert!(report.avatar_deleted);
        assert!(report.related_data_deleted);
        assert!(report.student_data_deleted);
        assert!(report.profile_deleted);
        assert!(report.auth_deleted);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);

        assert!(!storage.contains("avatars", AVATAR_KEY));
        assert!(!storage.contains("enrollment-documents", &document_key));
        assert_eq!(*identity.deleted.lock().unwrap(), vec![profile_id]);
        for table in ["students", "profiles", "student_license_categories", "enrollment_documents", "lessons"] {
            assert_eq!(row_count(&pool, table).await, 0, "{table} not emptied");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_student_whose_avatar_is_already_absent_is_still_deleted(pool: PgPool) {
        let profile_id = create_profile(&pool, "bia@example.com", Role::Student, Some(AVATAR_URL)).await;
        let student_id = create_student(&pool, profile_id).await;

        let storage = Arc::new(MemoryStorage::new());
        let identity = Arc::new(FakeIdentity::default());

        let report = deleter(&pool, &storage, &identity).delete_student(student_id).await.unwrap();

        assert!(report.avatar_deleted);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(row_count(&pool, "students").await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_storage_and_identity_failures_do_not_abort(pool: PgPool) {
        let profile_id = create_profile(&pool, "caio@example.com", Role::Student, Some(AVATAR_URL)).await;
        let student_id = create_student(&pool, profile_id).await;

        let storage = Arc::new(MemoryStorage::new().failing_removals("new row violates row-level security policy"));
        let identity = Arc::new(FakeIdentity {
            fail_deletes: Some("User not allowed".to_string()),
            ..Default::default()
        });

        let report = deleter(&pool, &storage, &identity).delete_student(student_id).await.unwrap();

        assert!(!report.avatar_deleted);
        // The enrollment document objects could not be removed either
        assert!(!report.related_data_deleted);
        assert!(report.student_data_deleted);
        assert!(report.profile_deleted);
        assert!(!report.auth_deleted);
        assert_eq!(report.warnings.len(), 3, "{:?}", report.warnings);
        assert!(report.warnings[0].contains("row-level security"));
        assert!(report.warnings[2].contains("User not allowed"));
        assert_eq!(row_count(&pool, "profiles").await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_missing_student_is_not_found(pool: PgPool) {
        let storage = Arc::new(MemoryStorage::new());
        let identity = Arc::new(FakeIdentity::default());

        let err = deleter(&pool, &storage, &identity)
            .delete_student(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref resource, .. } if resource == "Student"));
        assert!(storage.removals().is_empty());
        assert!(identity.deleted.lock().unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_instructor_unassigns_students(pool: PgPool) {
        let instructor_profile = create_profile(&pool, "dora@example.com", Role::Instructor, None).await;
        let instructor_id = create_instructor(&pool, instructor_profile).await;

        let student_profile = create_profile(&pool, "edu@example.com", Role::Student, None).await;
        let student_id = create_student(&pool, student_profile).await;
        sqlx::query("UPDATE students SET instructor_id = $1 WHERE id = $2")
            .bind(instructor_id)
            .bind(student_id)
            .execute(&pool)
            .await
            .unwrap();

        let storage = Arc::new(MemoryStorage::new());
        let identity = Arc::new(FakeIdentity::default());

        let report = deleter(&pool, &storage, &identity)
            .delete_instructor(instructor_id)
            .await
            .unwrap();

        assert!(!report.avatar_deleted);
        assert!(report.related_data_deleted);
        assert!(report.instructor_data_deleted);
        assert!(report.profile_deleted);
        assert!(report.auth_deleted);
        assert_eq!(row_count(&pool, "instructors").await, 0);
        assert_eq!(row_count(&pool, "classes").await, 0);
        assert_eq!(row_count(&pool, "instructor_specialties").await, 0);

        let mut conn = pool.acquire().await.unwrap();
        let student = Students::new(&mut conn).get_by_id(student_id).await.unwrap().unwrap();
        assert_eq!(student.instructor_id, None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_user_removes_owned_records(pool: PgPool) {
        let profile_id = create_profile(&pool, "fabi@example.com", Role::Student, Some(AVATAR_URL)).await;
        create_student(&pool, profile_id).await;

        let storage = Arc::new(MemoryStorage::new().with_object("avatars", AVATAR_KEY));
        let identity = Arc::new(FakeIdentity::default());

        let report = deleter(&pool, &storage, &identity)
            .delete_user(profile_id, DeleteType::User)
            .await
            .unwrap();

        assert!(report.avatar_deleted);
        assert!(report.student_data_deleted);
        assert!(!report.instructor_data_deleted);
        assert!(report.profile_deleted);
        assert!(report.auth_deleted);
        assert_eq!(row_count(&pool, "profiles").await, 0);
        assert_eq!(row_count(&pool, "students").await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_user_keeps_earlier_steps_when_profile_delete_fails(pool: PgPool) {
        let profile_id = create_profile(&pool, "gil@example.com", Role::Instructor, None).await;
        create_student(&pool, profile_id).await;
        create_instructor(&pool, profile_id).await;

        let storage = Arc::new(MemoryStorage::new());
        let identity = Arc::new(FakeIdentity::default());

        // The instructor record still references the profile
        let err = deleter(&pool, &storage, &identity)
            .delete_user(profile_id, DeleteType::Student)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(DbError::ForeignKeyViolation { .. })));

        assert_eq!(row_count(&pool, "students").await, 0);
        assert_eq!(row_count(&pool, "instructors").await, 1);
        assert_eq!(row_count(&pool, "profiles").await, 1);
        assert!(identity.deleted.lock().unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_missing_user_is_not_found(pool: PgPool) {
        let storage = Arc::new(MemoryStorage::new());
        let identity = Arc::new(FakeIdentity::default());

        let err = deleter(&pool, &storage, &identity)
            .delete_user(Uuid::new_v4(), DeleteType::User)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref resource, .. } if resource == "User"));
    }

    #[test]
    fn test_delete_type_defaults_to_user() {
        assert_eq!(DeleteType::default(), DeleteType::User);
        let parsed: DeleteType = serde_json::from_str("\"instructor\"").unwrap();
        assert_eq!(parsed, DeleteType::Instructor);
        assert!(!DeleteType::Student.includes_instructor());
    }
}

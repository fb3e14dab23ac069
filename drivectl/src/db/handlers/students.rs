//! Database repository for students and the rows they own.

use crate::api::models::students::StudentStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::students::{StudentCreateDBRequest, StudentDBResponse, StudentUpdateDBRequest},
};
use crate::types::{InstructorId, LicenseCategoryId, ProfileId, StudentId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

/// Student row joined with its profile, primary category and category links
const STUDENT_SELECT: &str = r#"
    SELECT
        s.id, s.profile_id, p.name, p.email, p.phone, p.avatar_url,
        s.license_category_id, lc.code AS license_category_code,
        ARRAY(
            SELECT slc.license_category_id FROM student_license_categories slc
            WHERE slc.student_id = s.id ORDER BY slc.license_category_id
        ) AS license_category_ids,
        s.instructor_id, s.status, s.progress, s.lessons_completed, s.total_lessons,
        s.enrollment_date, s.payment_status, s.access_status, s.is_active, s.country_code,
        s.created_at, s.updated_at
    FROM students s
    JOIN profiles p ON p.id = s.profile_id
    LEFT JOIN license_categories lc ON lc.id = s.license_category_id
"#;

const STUDENT_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR s.status = $1)
      AND ($2::uuid IS NULL OR s.instructor_id = $2)
      AND ($3::text IS NULL OR p.name ILIKE '%' || $3 || '%' OR p.email ILIKE '%' || $3 || '%')
"#;

/// Filter for listing students
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub status: Option<StudentStatus>,
    pub instructor_id: Option<InstructorId>,
    pub search: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

impl StudentFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

pub struct Students<'c> {
    db: &'c mut PgConnection,
}

async fn replace_category_links(conn: &mut PgConnection, id: StudentId, category_ids: &[LicenseCategoryId]) -> Result<()> {
    sqlx::query("DELETE FROM student_license_categories WHERE student_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if !category_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO student_license_categories (student_id, license_category_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(category_ids)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn fetch_student(conn: &mut PgConnection, id: StudentId) -> Result<Option<StudentDBResponse>> {
    let student = sqlx::query_as::<_, StudentDBResponse>(&format!("{STUDENT_SELECT} WHERE s.id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(student)
}

impl<'c> Students<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn get_by_profile_id(&mut self, profile_id: ProfileId) -> Result<Option<StudentDBResponse>> {
        let student = sqlx::query_as::<_, StudentDBResponse>(&format!("{STUDENT_SELECT} WHERE s.profile_id = $1"))
            .bind(profile_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(student)
    }

    /// Number of students matching the filter, ignoring skip and limit
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &StudentFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM students s JOIN profiles p ON p.id = s.profile_id {STUDENT_FILTER}"
        ))
        .bind(filter.status)
        .bind(filter.instructor_id)
        .bind(filter.search.as_deref())
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_license_links(&mut self, id: StudentId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM student_license_categories WHERE student_id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Storage keys of the student's enrollment documents
    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    pub async fn enrollment_document_paths(&mut self, id: StudentId) -> Result<Vec<String>> {
        let paths = sqlx::query_scalar("SELECT file_path FROM enrollment_documents WHERE student_id = $1 ORDER BY uploaded_at")
            .bind(id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(paths)
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_enrollment_documents(&mut self, id: StudentId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM enrollment_documents WHERE student_id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_lessons(&mut self, id: StudentId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM lessons WHERE student_id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Students<'c> {
    type CreateRequest = StudentCreateDBRequest;
    type UpdateRequest = StudentUpdateDBRequest;
    type Response = StudentDBResponse;
    type Id = StudentId;
    type Filter = StudentFilter;

    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&request.profile_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let id: StudentId = sqlx::query_scalar(
            r#"
            INSERT INTO students (
                profile_id, license_category_id, instructor_id, status, payment_status,
                access_status, enrollment_date, total_lessons, country_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, CURRENT_DATE), $8, $9)
            RETURNING id
            "#,
        )
        .bind(request.profile_id)
        .bind(request.license_category_id)
        .bind(request.instructor_id)
        .bind(request.status)
        .bind(request.payment_status)
        .bind(request.access_status)
        .bind(request.enrollment_date)
        .bind(request.total_lessons)
        .bind(&request.country_code)
        .fetch_one(&mut *tx)
        .await?;

        let mut category_ids = request.license_category_ids.clone();
        if category_ids.is_empty() {
            category_ids.extend(request.license_category_id);
        }
        replace_category_links(&mut *tx, id, &category_ids).await?;

        let student = fetch_student(&mut *tx, id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;

        Ok(student)
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        fetch_student(&mut *self.db, id).await
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let students = sqlx::query_as::<_, StudentDBResponse>(&format!(
            "{STUDENT_SELECT} {STUDENT_FILTER} ORDER BY p.name ASC, s.id LIMIT $4 OFFSET $5"
        ))
        .bind(filter.status)
        .bind(filter.instructor_id)
        .bind(filter.search.as_deref())
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(students)
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        sqlx::query_scalar::<_, StudentId>(
            r#"
            UPDATE students SET
                license_category_id = CASE WHEN $2 THEN $3 ELSE license_category_id END,
                instructor_id = CASE WHEN $4 THEN $5 ELSE instructor_id END,
                status = COALESCE($6, status),
                progress = COALESCE($7, progress),
                lessons_completed = COALESCE($8, lessons_completed),
                total_lessons = COALESCE($9, total_lessons),
                payment_status = COALESCE($10, payment_status),
                access_status = COALESCE($11, access_status),
                is_active = COALESCE($12, is_active),
                country_code = COALESCE($13, country_code),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(request.license_category_id.is_some())
        .bind(request.license_category_id.flatten())
        .bind(request.instructor_id.is_some())
        .bind(request.instructor_id.flatten())
        .bind(request.status)
        .bind(request.progress)
        .bind(request.lessons_completed)
        .bind(request.total_lessons)
        .bind(request.payment_status)
        .bind(request.access_status)
        .bind(request.is_active)
        .bind(&request.country_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(category_ids) = &request.license_category_ids {
            replace_category_links(&mut *tx, id, category_ids).await?;
        }

        let student = fetch_student(&mut *tx, id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;

        Ok(student)
    }
}

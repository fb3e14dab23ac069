//! Database repository for instructors and the rows they own.

use crate::api::models::instructors::InstructorStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::instructors::{InstructorCreateDBRequest, InstructorDBResponse, InstructorUpdateDBRequest},
};
use crate::types::{InstructorId, ProfileId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

const INSTRUCTOR_SELECT: &str = r#"
    SELECT
        i.id, i.profile_id, i.auth_user_id, p.name, p.email, p.phone, p.avatar_url,
        i.license, i.functions,
        ARRAY(
            SELECT sp.specialty FROM instructor_specialties sp
            WHERE sp.instructor_id = i.id ORDER BY sp.specialty
        ) AS specialties,
        i.status, i.is_active, i.hired_date,
        (SELECT COUNT(*) FROM students s WHERE s.instructor_id = i.id) AS student_count,
        i.created_at, i.updated_at
    FROM instructors i
    JOIN profiles p ON p.id = i.profile_id
"#;

const INSTRUCTOR_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR i.status = $1)
      AND ($2::text IS NULL OR p.name ILIKE '%' || $2 || '%' OR p.email ILIKE '%' || $2 || '%')
"#;

/// Filter for listing instructors
#[derive(Debug, Clone, Default)]
pub struct InstructorFilter {
    pub status: Option<InstructorStatus>,
    pub search: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

impl InstructorFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

pub struct Instructors<'c> {
    db: &'c mut PgConnection,
}

async fn replace_specialties(conn: &mut PgConnection, id: InstructorId, specialties: &[String]) -> Result<()> {
    sqlx::query("DELETE FROM instructor_specialties WHERE instructor_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let specialties: Vec<&str> = specialties.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if !specialties.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO instructor_specialties (instructor_id, specialty)
            SELECT $1, UNNEST($2::text[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&specialties)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn fetch_instructor(conn: &mut PgConnection, id: InstructorId) -> Result<Option<InstructorDBResponse>> {
    let instructor = sqlx::query_as::<_, InstructorDBResponse>(&format!("{INSTRUCTOR_SELECT} WHERE i.id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(instructor)
}

impl<'c> Instructors<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn get_by_profile_id(&mut self, profile_id: ProfileId) -> Result<Option<InstructorDBResponse>> {
        let instructor = sqlx::query_as::<_, InstructorDBResponse>(&format!("{INSTRUCTOR_SELECT} WHERE i.profile_id = $1"))
            .bind(profile_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(instructor)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &InstructorFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM instructors i JOIN profiles p ON p.id = i.profile_id {INSTRUCTOR_FILTER}"
        ))
        .bind(filter.status)
        .bind(filter.search.as_deref())
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(instructor_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_specialties(&mut self, id: InstructorId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM instructor_specialties WHERE instructor_id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(instructor_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_lessons(&mut self, id: InstructorId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM lessons WHERE instructor_id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(instructor_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_classes(&mut self, id: InstructorId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM classes WHERE instructor_id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Instructors<'c> {
    type CreateRequest = InstructorCreateDBRequest;
    type UpdateRequest = InstructorUpdateDBRequest;
    type Response = InstructorDBResponse;
    type Id = InstructorId;
    type Filter = InstructorFilter;

    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&request.profile_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let id: InstructorId = sqlx::query_scalar(
            r#"
            INSERT INTO instructors (profile_id, auth_user_id, license, functions, status, hired_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(request.profile_id)
        .bind(request.auth_user_id)
        .bind(&request.license)
        .bind(&request.functions)
        .bind(request.status)
        .bind(request.hired_date)
        .fetch_one(&mut *tx)
        .await?;

        replace_specialties(&mut *tx, id, &request.specialties).await?;

        let instructor = fetch_instructor(&mut *tx, id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;

        Ok(instructor)
    }

    #[instrument(skip(self), fields(instructor_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        fetch_instructor(&mut *self.db, id).await
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let instructors = sqlx::query_as::<_, InstructorDBResponse>(&format!(
            "{INSTRUCTOR_SELECT} {INSTRUCTOR_FILTER} ORDER BY p.name ASC, i.id LIMIT $3 OFFSET $4"
        ))
        .bind(filter.status)
        .bind(filter.search.as_deref())
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(instructors)
    }

    #[instrument(skip(self), fields(instructor_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM instructors WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(instructor_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        sqlx::query_scalar::<_, InstructorId>(
            r#"
            UPDATE instructors SET
                license = CASE WHEN $2 THEN $3 ELSE license END,
                functions = COALESCE($4, functions),
                status = COALESCE($5, status),
                is_active = COALESCE($6, is_active),
                hired_date = CASE WHEN $7 THEN $8 ELSE hired_date END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(request.license.is_some())
        .bind(request.license.as_ref().and_then(|inner| inner.as_deref()))
        .bind(&request.functions)
        .bind(request.status)
        .bind(request.is_active)
        .bind(request.hired_date.is_some())
        .bind(request.hired_date.flatten())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(specialties) = &request.specialties {
            replace_specialties(&mut *tx, id, specialties).await?;
        }

        let instructor = fetch_instructor(&mut *tx, id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;

        Ok(instructor)
    }
}

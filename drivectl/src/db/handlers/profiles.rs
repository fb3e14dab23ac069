//! Database repository for profiles.

use crate::api::models::profiles::{ProfileStatus, Role};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::profiles::{ProfileCreateDBRequest, ProfileDBResponse, ProfileUpdateDBRequest},
};
use crate::types::{ProfileId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

/// Filter for listing profiles
#[derive(Debug, Clone)]
pub struct ProfileFilter {
    pub role: Option<Role>,
    pub skip: i64,
    pub limit: i64,
}

impl ProfileFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { role: None, skip, limit }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Profile {
    pub id: ProfileId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub status: ProfileStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Profile> for ProfileDBResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            name: p.name,
            role: p.role,
            phone: p.phone,
            avatar_url: p.avatar_url,
            status: p.status,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

pub struct Profiles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Profiles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Set the avatar reference and return the one it replaced.
    #[instrument(skip(self, avatar_url), fields(profile_id = %abbrev_uuid(&id)), err)]
    pub async fn replace_avatar_url(&mut self, id: ProfileId, avatar_url: Option<&str>) -> Result<Option<String>> {
        let previous: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            UPDATE profiles p SET avatar_url = $2, updated_at = NOW()
            FROM (SELECT id, avatar_url FROM profiles WHERE id = $1 FOR UPDATE) old
            WHERE p.id = old.id
            RETURNING old.avatar_url
            "#,
        )
        .bind(id)
        .bind(avatar_url)
        .fetch_optional(&mut *self.db)
        .await?;

        previous.map(|(url,)| url).ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<ProfileDBResponse>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(profile.map(Into::into))
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Profiles<'c> {
    type CreateRequest = ProfileCreateDBRequest;
    type UpdateRequest = ProfileUpdateDBRequest;
    type Response = ProfileDBResponse;
    type Id = ProfileId;
    type Filter = ProfileFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, email, name, role, phone, avatar_url, status)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(&request.email)
        .bind(&request.name)
        .bind(request.role)
        .bind(&request.phone)
        .bind(&request.avatar_url)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(profile.into())
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(profile.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT * FROM profiles
            WHERE ($1::text IS NULL OR role = $1)
            ORDER BY name ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.role)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(profiles.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles SET
                name = COALESCE($2, name),
                phone = CASE WHEN $3 THEN $4 ELSE phone END,
                role = COALESCE($5, role),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.phone.is_some())
        .bind(request.phone.as_ref().and_then(|inner| inner.as_deref()))
        .bind(request.role)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(profile.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn profile_request(email: &str, role: Role) -> ProfileCreateDBRequest {
        ProfileCreateDBRequest {
            id: None,
            email: email.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            role,
            phone: None,
            avatar_url: None,
            status: ProfileStatus::Active,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_get_profile(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        let id = uuid::Uuid::new_v4();
        let created = repo
            .create(&ProfileCreateDBRequest {
                id: Some(id),
                ..profile_request("ana@example.com", Role::Student)
            })
            .await
            .unwrap();
        assert_eq!(created.id, id);
        assert_eq!(created.role, Role::Student);

        let found = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.email, "ana@example.com");

        let by_email = repo.get_by_email("ANA@example.com").await.unwrap();
        assert_eq!(by_email.map(|p| p.id), Some(id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        repo.create(&profile_request("dup@example.com", Role::Student)).await.unwrap();
        let err = repo.create(&profile_request("Dup@example.com", Role::Student)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_by_role(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        repo.create(&profile_request("a@example.com", Role::Student)).await.unwrap();
        repo.create(&profile_request("b@example.com", Role::Instructor)).await.unwrap();

        let all = repo.list(&ProfileFilter::new(0, 10)).await.unwrap();
        assert_eq!(all.len(), 2);

        let instructors = repo.list(&ProfileFilter::new(0, 10).with_role(Role::Instructor)).await.unwrap();
        assert_eq!(instructors.len(), 1);
        assert_eq!(instructors[0].email, "b@example.com");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_keeps_unset_fields(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        let created = repo.create(&profile_request("c@example.com", Role::Employee)).await.unwrap();
        let updated = repo
            .update(
                created.id,
                &ProfileUpdateDBRequest {
                    phone: Some(Some("+55 11 90000-0000".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.phone.as_deref(), Some("+55 11 90000-0000"));

        let missing = repo.update(uuid::Uuid::new_v4(), &ProfileUpdateDBRequest::default()).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_clears_phone(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        let created = repo
            .create(&ProfileCreateDBRequest {
                phone: Some("+55 11 90000-0000".to_string()),
                ..profile_request("e@example.com", Role::Employee)
            })
            .await
            .unwrap();

        let renamed = repo
            .update(
                created.id,
                &ProfileUpdateDBRequest {
                    name: Some("Eva".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.phone.as_deref(), Some("+55 11 90000-0000"));

        let cleared = repo
            .update(
                created.id,
                &ProfileUpdateDBRequest {
                    phone: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.phone, None);
        assert_eq!(cleared.name, "Eva");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_replace_avatar_url_returns_previous(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        let created = repo.create(&profile_request("d@example.com", Role::Student)).await.unwrap();

        let previous = repo.replace_avatar_url(created.id, Some("avatars/one.png")).await.unwrap();
        assert_eq!(previous, None);

        let previous = repo.replace_avatar_url(created.id, Some("avatars/two.png")).await.unwrap();
        assert_eq!(previous.as_deref(), Some("avatars/one.png"));

        let previous = repo.replace_avatar_url(created.id, None).await.unwrap();
        assert_eq!(previous.as_deref(), Some("avatars/two.png"));
        assert!(repo.get_by_id(created.id).await.unwrap().unwrap().avatar_url.is_none());

        let missing = repo.replace_avatar_url(uuid::Uuid::new_v4(), None).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_profile(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        let created = repo.create(&profile_request("e@example.com", Role::Student)).await.unwrap();
        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}

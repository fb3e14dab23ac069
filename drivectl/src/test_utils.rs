//! Test utilities for handler and orchestration tests.

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::models::instructors::{InstructorFunction, InstructorStatus};
use crate::api::models::profiles::{ProfileStatus, Role};
use crate::config::{Config, DatabaseConfig, IdentityConfig, PoolSettings, StorageConfig, SupabaseConfig};
use crate::db::handlers::{Instructors, Profiles, Repository, Students};
use crate::db::models::instructors::{InstructorCreateDBRequest, InstructorDBResponse};
use crate::db::models::profiles::{ProfileCreateDBRequest, ProfileDBResponse};
use crate::db::models::students::{StudentCreateDBRequest, StudentDBResponse};
use crate::identity::fake::FakeIdentity;
use crate::storage::memory::MemoryStorage;
use crate::types::{LicenseCategoryId, ProfileId};
use crate::{AppState, build_router};

/// Public URL prefix produced by [`MemoryStorage`] for the avatar bucket
pub const AVATAR_URL_PREFIX: &str = "http://storage.test/storage/v1/object/public/avatars/";

/// A running test server together with the fakes behind it, so tests can seed and inspect them.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<MemoryStorage>,
    pub identity: Arc<FakeIdentity>,
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        database: DatabaseConfig {
            // Will get overridden by the sqlx test pool
            url: "Something".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
            run_migrations: false,
        },
        supabase: SupabaseConfig {
            url: Some("https://testproject.supabase.co".parse().expect("static URL is valid")),
            service_role_key: Some("test-service-role-key".to_string()),
            request_timeout: Duration::from_secs(5),
        },
        storage: StorageConfig {
            settle_delay: Duration::ZERO,
            max_avatar_size: 1024,
            ..Default::default()
        },
        identity: IdentityConfig {
            initial_password: Some("initial-password".to_string()),
            auto_confirm_email: true,
        },
        cors: Default::default(),
        enable_otel_export: false,
    }
}

pub async fn create_test_app(pool: PgPool) -> TestApp {
    create_test_app_with(pool, MemoryStorage::new(), FakeIdentity::default())
}

/// Build a test server over the given fakes
pub fn create_test_app_with(pool: PgPool, storage: MemoryStorage, identity: FakeIdentity) -> TestApp {
    let storage = Arc::new(storage);
    let identity = Arc::new(identity);

    let state = AppState::builder()
        .db(pool)
        .config(create_test_config())
        .storage(storage.clone())
        .identity(identity.clone())
        .build();

    let router = build_router(&state).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp { server, storage, identity }
}

pub async fn create_test_profile(pool: &PgPool, email: &str, role: Role, avatar_url: Option<&str>) -> ProfileDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
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
        .expect("Failed to create test profile")
}

pub async fn license_category_id(pool: &PgPool, code: &str) -> LicenseCategoryId {
    sqlx::query_scalar("SELECT id FROM license_categories WHERE code = $1")
        .bind(code)
        .fetch_one(pool)
        .await
        .expect("License category should be seeded")
}

pub async fn create_test_student(pool: &PgPool, email: &str, avatar_url: Option<&str>) -> StudentDBResponse {
    let profile = create_test_profile(pool, email, Role::Student, avatar_url).await;
    let category_id = license_category_id(pool, "B").await;

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Students::new(&mut conn)
        .create(&StudentCreateDBRequest {
            license_category_id: Some(category_id),
            ..StudentCreateDBRequest::new(profile.id)
        })
        .await
        .expect("Failed to create test student")
}

pub async fn create_test_instructor(pool: &PgPool, email: &str, avatar_url: Option<&str>) -> InstructorDBResponse {
    let profile = create_test_profile(pool, email, Role::Instructor, avatar_url).await;

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Instructors::new(&mut conn)
        .create(&InstructorCreateDBRequest {
            profile_id: profile.id,
            auth_user_id: Some(profile.id),
            license: Some("12345678900".to_string()),
            functions: vec![InstructorFunction::Practical],
            specialties: vec!["B".to_string()],
            status: InstructorStatus::Active,
            hired_date: None,
        })
        .await
        .expect("Failed to create test instructor")
}

pub async fn profile_exists(pool: &PgPool, id: ProfileId) -> bool {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM profiles WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Failed to query profiles")
}

//! # drivectl: Administrative backend for a driving-school platform
//!
//! `drivectl` is the server side of the school's administrative dashboard. It manages students,
//! instructors and user profiles, and it owns the lifecycle of their avatar images.
//!
//! ## Overview
//!
//! The service sits in front of three collaborators supplied by a backend-as-a-service:
//!
//! - an **object storage** service, where avatars and enrollment documents live
//! - a **PostgreSQL** database holding profiles, students, instructors and their dependent rows
//! - an **identity** service that owns the user accounts
//!
//! Stored avatar references come in several shapes (full public URLs, bucket-relative keys, bare
//! file names). The [`avatars`] module turns any of them into an object key, deletes the object
//! idempotently and optionally checks the deletion took effect. Every entry point that touches an
//! avatar goes through it.
//!
//! ## Request Flow
//!
//! Two HTTP surfaces are exposed:
//!
//! - `/api/*`: the maintenance endpoints the dashboard front end calls directly (avatar deletion
//!   and diagnostics, account deletion, a project configuration check). Bodies are camelCase and
//!   backend failures are reported in-band as `{success: false, message}`.
//! - `/admin/api/v1/*`: REST resources for students, instructors, profiles and license
//!   categories, including avatar upload and removal.
//!
//! Handlers reach the database through repositories in [`db::handlers`] and reach the backend
//! through the [`storage::ObjectStorage`] and [`identity::IdentityAdmin`] traits, which are built
//! once at startup and shared through [`AppState`]. Multi-step deletions are orchestrated by
//! [`deletion::EntityDeleter`].
//!
//! No authentication is enforced at this layer.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use drivectl::{Application, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = drivectl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     drivectl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod avatars;
pub mod config;
pub mod db;
pub mod deletion;
pub mod errors;
pub mod identity;
mod openapi;
pub mod storage;
pub mod supabase;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{self, HeaderValue};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use bon::Builder;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::avatars::AvatarCleaner;
use crate::config::{Config, CorsOrigin, StorageBackend};
use crate::deletion::EntityDeleter;
use crate::errors::Error;
use crate::identity::{IdentityAdmin, SupabaseIdentity};
use crate::openapi::{AdminApiDoc, DashboardApiDoc};
use crate::storage::ObjectStorage;
use crate::supabase::{SupabaseClient, missing_settings};

/// Slack on top of `storage.max_avatar_size` for the multipart envelope of an upload, so an image
/// of exactly the maximum size is judged by the handler and not rejected by the body limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// The backend collaborators are optional: when the service-role credentials are not configured
/// the service still starts, and only the requests that need storage or identity fail with a
/// configuration error.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .maybe_storage(storage)
///     .maybe_identity(identity)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub identity: Option<Arc<dyn IdentityAdmin>>,
}

impl AppState {
    fn not_configured(&self) -> Error {
        let missing = missing_settings(&self.config.supabase);
        Error::Configuration {
            missing: if missing.is_empty() {
                "Storage backend".to_string()
            } else {
                missing.join(", ")
            },
        }
    }

    pub fn require_storage(&self) -> errors::Result<Arc<dyn ObjectStorage>> {
        self.storage.clone().ok_or_else(|| self.not_configured())
    }

    pub fn require_identity(&self) -> errors::Result<Arc<dyn IdentityAdmin>> {
        self.identity.clone().ok_or_else(|| self.not_configured())
    }

    /// Avatar pipeline over the configured storage backend
    pub fn avatar_cleaner(&self) -> errors::Result<AvatarCleaner> {
        Ok(AvatarCleaner::new(self.require_storage()?, &self.config.storage))
    }

    pub fn entity_deleter(&self) -> errors::Result<EntityDeleter> {
        Ok(EntityDeleter::new(
            self.db.clone(),
            self.require_storage()?,
            self.require_identity()?,
            &self.config.storage,
        ))
    }
}

/// Get the drivectl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to the database and apply migrations when configured to.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }

    let pool = options.connect(&config.database.url).await?;

    if config.database.run_migrations {
        migrator().run(&pool).await?;
    } else {
        info!("Skipping migrations (database.run_migrations = false)");
    }

    Ok(pool)
}

type Backends = (Option<Arc<dyn ObjectStorage>>, Option<Arc<dyn IdentityAdmin>>);

/// Build the process-wide backend client and the storage and identity backends sharing it.
fn setup_backends(config: &Config) -> anyhow::Result<Backends> {
    let supabase = SupabaseClient::from_config(&config.supabase)?;
    if supabase.is_none() {
        tracing::warn!(
            "Backend credentials missing ({}): storage and identity requests will fail",
            missing_settings(&config.supabase).join(", ")
        );
    }

    let storage = storage::create_storage(&config.storage.backend, supabase.as_ref());
    let identity = supabase.map(|client| Arc::new(SupabaseIdentity::new(client)) as Arc<dyn IdentityAdmin>);

    Ok((storage, identity))
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;
    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        if cors_config.allow_credentials {
            anyhow::bail!("cors.allow_credentials cannot be combined with a wildcard origin");
        }
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a path, but Url always renders one
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PATCH, http::Method::DELETE])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - `/api/*`: dashboard maintenance endpoints
/// - `/admin/api/v1/*`: REST resources
/// - `/healthz`, plus API docs at `/admin/docs` and `/api/docs`
/// - with the local storage backend, the storage directory under the path of its public base URL
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let dashboard_routes = Router::new()
        .route("/delete-avatar-admin", post(api::handlers::avatars::delete_avatar_admin))
        .route("/debug-avatar-url", post(api::handlers::avatars::debug_avatar_url))
        .route("/verify-file-exists", post(api::handlers::avatars::verify_file_exists))
        .route("/force-delete-avatar", post(api::handlers::avatars::force_delete_avatar))
        .route("/delete-user-auth", post(api::handlers::users::delete_user_auth))
        .route("/delete-user", post(api::handlers::users::delete_user))
        .route("/verify-project", get(api::handlers::project::verify_project))
        .with_state(state.clone());

    // Uploads get their own body limit; every other route keeps the default
    let upload_limit = DefaultBodyLimit::max(state.config.storage.max_avatar_size + MULTIPART_OVERHEAD);
    let upload_routes = Router::new()
        .route(
            "/students/{id}/avatar",
            post(api::handlers::students::upload_student_avatar).layer(upload_limit),
        )
        .route(
            "/instructors/{id}/avatar",
            post(api::handlers::instructors::upload_instructor_avatar).layer(upload_limit),
        )
        .route(
            "/profiles/{id}/avatar",
            post(api::handlers::profiles::upload_profile_avatar).layer(upload_limit),
        );

    let api_routes = Router::new()
        .merge(upload_routes)
        // Students
        .route("/students", get(api::handlers::students::list_students))
        .route("/students", post(api::handlers::students::create_student))
        .route("/students/{id}", get(api::handlers::students::get_student))
        .route("/students/{id}", patch(api::handlers::students::update_student))
        .route("/students/{id}", delete(api::handlers::students::delete_student))
        .route("/students/{id}/avatar", delete(api::handlers::students::remove_student_avatar))
        // Instructors
        .route("/instructors", get(api::handlers::instructors::list_instructors))
        .route("/instructors", post(api::handlers::instructors::create_instructor))
        .route("/instructors/{id}", get(api::handlers::instructors::get_instructor))
        .route("/instructors/{id}", patch(api::handlers::instructors::update_instructor))
        .route("/instructors/{id}", delete(api::handlers::instructors::delete_instructor))
        .route(
            "/instructors/{id}/avatar",
            delete(api::handlers::instructors::remove_instructor_avatar),
        )
        // Profiles
        .route("/profiles/{id}", get(api::handlers::profiles::get_profile))
        .route("/profiles/{id}", patch(api::handlers::profiles::update_profile))
        .route("/profiles/{id}", delete(api::handlers::profiles::delete_profile))
        .route("/profiles/{id}/avatar", delete(api::handlers::profiles::remove_profile_avatar))
        // Catalogue
        .route(
            "/license-categories",
            get(api::handlers::license_categories::list_license_categories),
        )
        .route(
            "/license-categories/{id}",
            get(api::handlers::license_categories::get_license_category),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", dashboard_routes)
        .nest("/admin/api/v1", api_routes)
        .merge(Scalar::with_url("/admin/docs", AdminApiDoc::openapi()))
        .merge(Scalar::with_url("/api/docs", DashboardApiDoc::openapi()));

    // The local backend's public URLs point back at this service
    let router = match &state.config.storage.backend {
        StorageBackend::Local { path, public_base_url } => {
            let files = ServeDir::new(path);
            match public_base_url.path().trim_end_matches('/') {
                "" => router.fallback_service(files),
                mount => router.nest_service(mount, files),
            }
        }
        StorageBackend::Supabase => router,
    };

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and builds the
///    backend clients
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests finish and the pool is
///    closed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application, reusing `pool` instead of connecting when one is given
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting drivectl with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                if config.database.run_migrations {
                    migrator().run(&pool).await?;
                }
                pool
            }
            None => setup_database(&config).await?,
        };

        let (storage, identity) = setup_backends(&config)?;

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .maybe_storage(storage)
            .maybe_identity(identity)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "drivectl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::create_test_config;
    use axum::http::StatusCode;

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_integration(pool: PgPool) {
        let mut config = create_test_config();
        config.database.run_migrations = false;

        let app = Application::new_with_pool(config, Some(pool)).await;
        assert!(app.is_ok(), "Application::new_with_pool should succeed");
        let server = app.unwrap().into_test_server();

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        assert_eq!(health.text(), "OK");

        let categories = server.get("/admin/api/v1/license-categories").await;
        categories.assert_status_ok();

        let docs = server.get("/admin/docs").await;
        docs.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_credentials_fail_backend_requests(pool: PgPool) {
        let mut config = create_test_config();
        config.database.run_migrations = false;
        config.supabase.url = None;
        config.supabase.service_role_key = None;
        config.storage.backend = crate::config::StorageBackend::Supabase;

        let server = Application::new_with_pool(config, Some(pool))
            .await
            .expect("Failed to create application")
            .into_test_server();

        let response = server
            .post("/api/delete-avatar-admin")
            .json(&serde_json::json!({ "avatarUrl": "avatars/ana.png" }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Environment variables not configured");
        assert!(
            body["details"]
                .as_str()
                .is_some_and(|d| d.contains("SUPABASE_URL") && d.contains("SUPABASE_SERVICE_ROLE_KEY"))
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_local_storage_objects_are_served(pool: PgPool) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = create_test_config();
        config.storage.backend = crate::config::StorageBackend::Local {
            path: dir.path().to_path_buf(),
            public_base_url: "http://localhost:3001/storage/v1/object/public/".parse().unwrap(),
        };

        let storage = crate::storage::create_storage(&config.storage.backend, None).unwrap();
        let url = storage
            .upload("avatars", "student-avatars/ana.png", bytes::Bytes::from_static(b"png-bytes"), "image/png")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3001/storage/v1/object/public/avatars/student-avatars/ana.png");

        let state = AppState::builder().db(pool).config(config).storage(storage).build();
        let server = axum_test::TestServer::new(build_router(&state).unwrap()).unwrap();

        let response = server.get("/storage/v1/object/public/avatars/student-avatars/ana.png").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "png-bytes");

        server
            .get("/storage/v1/object/public/avatars/student-avatars/gone.png")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server.get("/healthz").await.assert_status_ok();
    }

    #[test]
    fn test_cors_layer_accepts_configured_origins() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![
            CorsOrigin::Url("https://dashboard.example.com".parse().unwrap()),
            CorsOrigin::Url("http://localhost:5173".parse().unwrap()),
        ];
        config.cors.max_age = Some(600);
        assert!(create_cors_layer(&config).is_ok());
    }

    #[test]
    fn test_cors_layer_rejects_credentials_with_wildcard() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        config.cors.allow_credentials = true;
        assert!(create_cors_layer(&config).is_err());

        config.cors.allow_credentials = false;
        assert!(create_cors_layer(&config).is_ok());
    }

    #[tokio::test]
    async fn test_not_configured_names_missing_settings() {
        let mut config = create_test_config();
        config.supabase.service_role_key = None;
        let state = AppState::builder()
            .db(PgPoolOptions::new().connect_lazy("postgres://localhost/unused").unwrap())
            .config(config)
            .build();

        match state.require_identity() {
            Err(Error::Configuration { missing }) => assert_eq!(missing, "SUPABASE_SERVICE_ROLE_KEY"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("identity should not be configured"),
        }
    }
}

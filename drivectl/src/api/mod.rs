//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Students** (`/admin/api/v1/students/*`): enrollment records and their avatars
//! - **Instructors** (`/admin/api/v1/instructors/*`): instructor records and their avatars
//! - **Profiles** (`/admin/api/v1/profiles/*`): user profiles and their avatars
//! - **License categories** (`/admin/api/v1/license-categories`): catalogue
//! - **Dashboard maintenance** (`/api/*`): avatar deletion and diagnostics, account deletion,
//!   project check
//!
//! # OpenAPI Documentation
//!
//! Both surfaces are annotated with `utoipa`. Documentation is served at `/admin/docs` for the
//! admin resources and at `/api/docs` for the maintenance endpoints.

pub mod handlers;
pub mod models;

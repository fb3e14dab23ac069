//! HTTP request handlers for all API endpoints.
//!
//! Handlers are Axum route functions grouped by resource. They validate input, call the
//! repositories in [`crate::db::handlers`] or the avatar and deletion services, and map failures to
//! [`crate::errors::Error`].
//!
//! # Handler Modules
//!
//! Admin resources under `/admin/api/v1`:
//!
//! - [`students`]: enrollment CRUD, avatar upload and removal
//! - [`instructors`]: instructor CRUD, avatar upload and removal
//! - [`profiles`]: profile read/update/delete, avatar upload and removal
//! - [`license_categories`]: the read-only category catalogue
//!
//! Dashboard maintenance endpoints under `/api`:
//!
//! - [`avatars`]: avatar deletion by reference, path diagnostics, existence checks and forced
//!   deletion
//! - [`users`]: identity-only and full account deletion
//! - [`project`]: backend configuration check
//!
//! # Error Handling
//!
//! Admin handlers return [`crate::errors::Error`], which renders as `{error, details?}` with a
//! matching status code. The diagnostic endpoints in [`avatars`] and [`project`] report backend
//! failures in-band as `{success: false, message}` with status 200.

pub mod avatars;
pub mod instructors;
pub mod license_categories;
pub mod profiles;
pub mod project;
pub mod students;
pub mod users;

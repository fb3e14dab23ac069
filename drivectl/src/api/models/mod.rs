//! API request and response data models.
//!
//! API models are distinct from database models so the wire format can evolve independently of
//! the tables. Every model is annotated with `utoipa` for the generated API docs.
//!
//! # Model Categories
//!
//! ## Admin resources (`/admin/api/v1`)
//!
//! - [`students`]: enrollment records joined with their profile
//! - [`instructors`]: instructor records joined with their profile
//! - [`profiles`]: user profiles, roles and account status
//! - [`license_categories`]: the license category catalogue
//! - [`pagination`]: shared `skip`/`limit` query parameters and list wrapper
//!
//! ## Dashboard maintenance endpoints (`/api`)
//!
//! - [`avatars`]: avatar deletion and diagnostics (camelCase bodies)
//! - [`users`]: account deletion
//! - [`project`]: backend configuration check

pub mod avatars;
pub mod instructors;
pub mod license_categories;
pub mod pagination;
pub mod profiles;
pub mod project;
pub mod students;
pub mod users;

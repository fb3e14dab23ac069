//! OpenAPI documentation configuration.
//!
//! This module provides OpenAPI documentation for the two API surfaces:
//! - [`admin::AdminApiDoc`]: REST resources at `/admin/api/v1/*`
//! - [`dashboard::DashboardApiDoc`]: dashboard maintenance endpoints at `/api/*`

pub mod admin;
pub mod dashboard;
mod extra_types;

pub use admin::AdminApiDoc;
pub use dashboard::DashboardApiDoc;

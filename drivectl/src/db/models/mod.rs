//! Database models for data persistence.
//!
//! Each module holds the request types a repository accepts and the response type it returns.
//! Row structs used with `sqlx::FromRow` stay private to the repositories where the row shape
//! differs from the response.

pub mod instructors;
pub mod license_categories;
pub mod profiles;
pub mod students;

//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (or transaction), provides strongly-typed
//! operations, and returns models from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Profiles`]: profile rows, including the current avatar reference
//! - [`Students`]: student records and their dependent rows (license links, enrollment
//!   documents, lessons)
//! - [`Instructors`]: instructor records and their dependent rows (specialties, lessons, classes)
//! - [`LicenseCategories`]: read-only license category catalogue
//!
//! ```ignore
//! use drivectl::db::handlers::{Students, Repository};
//!
//! let mut conn = pool.acquire().await?;
//! let mut repo = Students::new(&mut conn);
//! let student = repo.get_by_id(student_id).await?;
//! ```

pub mod instructors;
pub mod license_categories;
pub mod profiles;
pub mod repository;
pub mod students;

pub use instructors::Instructors;
pub use license_categories::LicenseCategories;
pub use profiles::Profiles;
pub use repository::Repository;
pub use students::Students;

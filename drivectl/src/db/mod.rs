//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, deletion orchestration)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Repositories borrow a connection, so multi-step writes that must be atomic are run on a
//! transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let profile = Profiles::new(&mut tx).update(id, &profile_update).await?;
//! let student = Students::new(&mut tx).update(student_id, &student_update).await?;
//! tx.commit().await?;
//! ```
//!
//! Entity deletion deliberately does not use one transaction; see [`crate::deletion`].
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are applied through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;

//! Database models for instructors.

use crate::api::models::instructors::{InstructorFunction, InstructorStatus, InstructorUpdate};
use crate::types::{InstructorId, ProfileId};
use chrono::{DateTime, NaiveDate, Utc};

/// Database request for creating an instructor record for an existing profile
#[derive(Debug, Clone)]
pub struct InstructorCreateDBRequest {
    pub profile_id: ProfileId,
    /// Identity account that signs in as this instructor, usually the profile id
    pub auth_user_id: Option<uuid::Uuid>,
    pub license: Option<String>,
    pub functions: Vec<InstructorFunction>,
    pub specialties: Vec<String>,
    pub status: InstructorStatus,
    pub hired_date: Option<NaiveDate>,
}

/// Database request for updating an instructor; `None` keeps the current value and `Some(None)`
/// clears a nullable column
#[derive(Debug, Clone, Default)]
pub struct InstructorUpdateDBRequest {
    pub license: Option<Option<String>>,
    pub functions: Option<Vec<InstructorFunction>>,
    pub specialties: Option<Vec<String>>,
    pub status: Option<InstructorStatus>,
    pub is_active: Option<bool>,
    pub hired_date: Option<Option<NaiveDate>>,
}

impl From<&InstructorUpdate> for InstructorUpdateDBRequest {
    fn from(update: &InstructorUpdate) -> Self {
        Self {
            license: update.license.clone(),
            functions: update.functions.clone(),
            specialties: update.specialties.clone(),
            status: update.status,
            is_active: update.is_active,
            hired_date: update.hired_date,
        }
    }
}

/// Instructor record joined with its profile
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstructorDBResponse {
    pub id: InstructorId,
    pub profile_id: ProfileId,
    pub auth_user_id: Option<uuid::Uuid>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub license: Option<String>,
    pub functions: Vec<InstructorFunction>,
    pub specialties: Vec<String>,
    pub status: InstructorStatus,
    pub is_active: bool,
    pub hired_date: Option<NaiveDate>,
    pub student_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//! Database models for students.

use crate::api::models::students::{AccessStatus, PaymentStatus, StudentStatus, StudentUpdate};
use crate::types::{InstructorId, LicenseCategoryId, ProfileId, StudentId};
use chrono::{DateTime, NaiveDate, Utc};

/// Database request for creating a student record for an existing profile
#[derive(Debug, Clone)]
pub struct StudentCreateDBRequest {
    pub profile_id: ProfileId,
    pub license_category_id: Option<LicenseCategoryId>,
    pub license_category_ids: Vec<LicenseCategoryId>,
    pub instructor_id: Option<InstructorId>,
    pub status: StudentStatus,
    pub payment_status: PaymentStatus,
    pub access_status: AccessStatus,
    /// Defaults to today
    pub enrollment_date: Option<NaiveDate>,
    pub total_lessons: i32,
    pub country_code: String,
}

impl StudentCreateDBRequest {
    pub fn new(profile_id: ProfileId) -> Self {
        Self {
            profile_id,
            license_category_id: None,
            license_category_ids: Vec::new(),
            instructor_id: None,
            status: StudentStatus::Enrolled,
            payment_status: PaymentStatus::Pending,
            access_status: AccessStatus::Active,
            enrollment_date: None,
            total_lessons: 0,
            country_code: "BR".to_string(),
        }
    }
}

/// Database request for updating student fields; `None` keeps the current value and `Some(None)`
/// clears a nullable column
#[derive(Debug, Clone, Default)]
pub struct StudentUpdateDBRequest {
    pub license_category_id: Option<Option<LicenseCategoryId>>,
    pub license_category_ids: Option<Vec<LicenseCategoryId>>,
    pub instructor_id: Option<Option<InstructorId>>,
    pub status: Option<StudentStatus>,
    pub progress: Option<i32>,
    pub lessons_completed: Option<i32>,
    pub total_lessons: Option<i32>,
    pub payment_status: Option<PaymentStatus>,
    pub access_status: Option<AccessStatus>,
    pub is_active: Option<bool>,
    pub country_code: Option<String>,
}

impl From<&StudentUpdate> for StudentUpdateDBRequest {
    fn from(update: &StudentUpdate) -> Self {
        Self {
            license_category_id: update.license_category_id,
            license_category_ids: update.license_category_ids.clone(),
            instructor_id: update.instructor_id,
            status: update.status,
            progress: update.progress,
            lessons_completed: update.lessons_completed,
            total_lessons: update.total_lessons,
            payment_status: update.payment_status,
            access_status: update.access_status,
            is_active: update.is_active,
            country_code: update.country_code.clone(),
        }
    }
}

/// Student record joined with its profile
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentDBResponse {
    pub id: StudentId,
    pub profile_id: ProfileId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub license_category_id: Option<LicenseCategoryId>,
    pub license_category_code: Option<String>,
    pub license_category_ids: Vec<LicenseCategoryId>,
    pub instructor_id: Option<InstructorId>,
    pub status: StudentStatus,
    pub progress: i32,
    pub lessons_completed: i32,
    pub total_lessons: i32,
    pub enrollment_date: NaiveDate,
    pub payment_status: PaymentStatus,
    pub access_status: AccessStatus,
    pub is_active: bool,
    pub country_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//! API request/response models for students.

use crate::api::models::pagination::Pagination;
use crate::db::models::students::StudentDBResponse;
use crate::types::{InstructorId, LicenseCategoryId, ProfileId, StudentId, text_enum};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::{IntoParams, ToSchema};

text_enum!(
    /// Where the student is in the licensing process
    StudentStatus {
        Enrolled => "enrolled",
        InProgress => "in_progress",
        Approved => "approved",
        Failed => "failed",
        Suspended => "suspended",
    }
);

text_enum!(PaymentStatus {
    Pending => "pending",
    Approved => "approved",
    Failed => "failed",
    Refunded => "refunded",
    Trial => "trial",
});

text_enum!(
    /// Whether the student may sign in to the learning platform
    AccessStatus {
        Active => "active",
        Inactive => "inactive",
    }
);

/// Query parameters for listing students
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListStudentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<StudentStatus>,

    /// Only students assigned to this instructor
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub instructor_id: Option<InstructorId>,

    /// Case-insensitive substring match on name or email
    pub search: Option<String>,
}

/// Request body for enrolling a student. Creates the identity account, the profile and the
/// student record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentCreate {
    #[schema(example = "Ana Souza")]
    pub name: String,
    #[schema(example = "ana@example.com")]
    pub email: String,
    pub phone: Option<String>,
    /// Primary license category
    #[schema(value_type = Option<String>, format = "uuid")]
    pub license_category_id: Option<LicenseCategoryId>,
    /// Every category the student is enrolled in; defaults to the primary one
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub license_category_ids: Vec<LicenseCategoryId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub instructor_id: Option<InstructorId>,
    pub status: Option<StudentStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub access_status: Option<AccessStatus>,
    pub enrollment_date: Option<NaiveDate>,
    pub total_lessons: Option<i32>,
    #[schema(example = "BR")]
    pub country_code: Option<String>,
}

/// Request body for updating a student. Profile fields and student fields may be mixed; only
/// provided fields are changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StudentUpdate {
    pub name: Option<String>,
    /// None = no change, Some(None) = clear
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    /// None = no change, Some(None) = clear
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub license_category_id: Option<Option<LicenseCategoryId>>,
    /// Replaces the full set of categories when present
    #[schema(value_type = Option<Vec<String>>)]
    pub license_category_ids: Option<Vec<LicenseCategoryId>>,
    /// None = no change, Some(None) = unassign
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
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

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: StudentId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub license_category_id: Option<LicenseCategoryId>,
    /// Code of the primary license category, e.g. `B`
    pub license_category_code: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub license_category_ids: Vec<LicenseCategoryId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub instructor_id: Option<InstructorId>,
    pub status: StudentStatus,
    /// Percentage of the course completed
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

impl From<StudentDBResponse> for StudentResponse {
    fn from(db: StudentDBResponse) -> Self {
        Self {
            id: db.id,
            profile_id: db.profile_id,
            name: db.name,
            email: db.email,
            phone: db.phone,
            avatar_url: db.avatar_url,
            license_category_id: db.license_category_id,
            license_category_code: db.license_category_code,
            license_category_ids: db.license_category_ids,
            instructor_id: db.instructor_id,
            status: db.status,
            progress: db.progress,
            lessons_completed: db.lessons_completed,
            total_lessons: db.total_lessons,
            enrollment_date: db.enrollment_date,
            payment_status: db.payment_status,
            access_status: db.access_status,
            is_active: db.is_active,
            country_code: db.country_code,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

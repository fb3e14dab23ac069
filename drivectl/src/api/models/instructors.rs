//! API request/response models for instructors.

use crate::api::models::pagination::Pagination;
use crate::db::models::instructors::InstructorDBResponse;
use crate::types::{InstructorId, ProfileId, text_enum};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::{IntoParams, ToSchema};

text_enum!(InstructorStatus {
    Invited => "invited",
    Active => "active",
    Inactive => "inactive",
});

text_enum!(
    /// Kind of lessons an instructor teaches
    InstructorFunction {
        Theoretical => "theoretical",
        Practical => "practical",
    }
);

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListInstructorsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<InstructorStatus>,

    /// Case-insensitive substring match on name or email
    pub search: Option<String>,
}

/// Request body for inviting an instructor
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstructorCreate {
    #[schema(example = "Carlos Lima")]
    pub name: String,
    #[schema(example = "carlos@example.com")]
    pub email: String,
    pub phone: Option<String>,
    /// Instructor license number
    pub license: Option<String>,
    #[serde(default)]
    pub functions: Vec<InstructorFunction>,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub status: Option<InstructorStatus>,
    pub hired_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct InstructorUpdate {
    pub name: Option<String>,
    /// None = no change, Some(None) = clear
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    /// None = no change, Some(None) = clear
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub license: Option<Option<String>>,
    pub functions: Option<Vec<InstructorFunction>>,
    /// Replaces the full set of specialties when present
    pub specialties: Option<Vec<String>>,
    pub status: Option<InstructorStatus>,
    pub is_active: Option<bool>,
    /// None = no change, Some(None) = clear
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub hired_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstructorResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: InstructorId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
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
    /// Number of students currently assigned
    pub student_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InstructorDBResponse> for InstructorResponse {
    fn from(db: InstructorDBResponse) -> Self {
        Self {
            id: db.id,
            profile_id: db.profile_id,
            name: db.name,
            email: db.email,
            phone: db.phone,
            avatar_url: db.avatar_url,
            license: db.license,
            functions: db.functions,
            specialties: db.specialties,
            status: db.status,
            is_active: db.is_active,
            hired_date: db.hired_date,
            student_count: db.student_count,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

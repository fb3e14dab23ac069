//! API request/response models for user profiles.

use crate::db::models::profiles::ProfileDBResponse;
use crate::types::{ProfileId, text_enum};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::ToSchema;

text_enum!(
    /// What a profile is allowed to do in the dashboard
    Role {
        Admin => "admin",
        School => "school",
        Instructor => "instructor",
        Student => "student",
        Employee => "employee",
    }
);

text_enum!(
    /// Account lifecycle state
    ProfileStatus {
        Active => "active",
        Inactive => "inactive",
        PendingFirstLogin => "pending_first_login",
    }
);

/// Request body for updating a profile. Only provided fields are changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    #[schema(example = "Ana Souza")]
    pub name: Option<String>,
    /// None = no change, Some(None) = clear
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>, example = "+55 11 99999-0000")]
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
    pub status: Option<ProfileStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    /// Profile id, identical to the identity account id
    #[schema(value_type = String, format = "uuid")]
    pub id: ProfileId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    /// Public URL of the current avatar image
    pub avatar_url: Option<String>,
    pub status: ProfileStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileDBResponse> for ProfileResponse {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            name: db.name,
            role: db.role,
            phone: db.phone,
            avatar_url: db.avatar_url,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

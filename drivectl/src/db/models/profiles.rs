//! Database models for profiles.

use crate::api::models::profiles::{ProfileStatus, ProfileUpdate, Role};
use crate::types::ProfileId;
use chrono::{DateTime, Utc};

/// Database request for creating a profile
#[derive(Debug, Clone)]
pub struct ProfileCreateDBRequest {
    /// Identity account id. Generated when absent.
    pub id: Option<ProfileId>,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub status: ProfileStatus,
}

/// Database request for updating a profile; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateDBRequest {
    pub name: Option<String>,
    /// `Some(None)` clears the phone number
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
    pub status: Option<ProfileStatus>,
}

impl From<ProfileUpdate> for ProfileUpdateDBRequest {
    fn from(update: ProfileUpdate) -> Self {
        Self {
            name: update.name,
            phone: update.phone,
            role: update.role,
            status: update.status,
        }
    }
}

impl ProfileUpdateDBRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.role.is_none() && self.status.is_none()
    }
}

/// Database response for a profile
#[derive(Debug, Clone)]
pub struct ProfileDBResponse {
    pub id: ProfileId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub status: ProfileStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

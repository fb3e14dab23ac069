//! API response model for license categories.

use crate::db::models::license_categories::LicenseCategoryDBResponse;
use crate::types::LicenseCategoryId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LicenseCategoryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: LicenseCategoryId,
    #[schema(example = "B")]
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<LicenseCategoryDBResponse> for LicenseCategoryResponse {
    fn from(db: LicenseCategoryDBResponse) -> Self {
        Self {
            id: db.id,
            code: db.code,
            name: db.name,
            description: db.description,
        }
    }
}

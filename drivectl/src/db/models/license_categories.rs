//! Database models for license categories.

use crate::types::LicenseCategoryId;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LicenseCategoryDBResponse {
    pub id: LicenseCategoryId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

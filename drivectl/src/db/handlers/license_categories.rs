//! Read-only access to the seeded license categories.

use crate::db::{errors::Result, models::license_categories::LicenseCategoryDBResponse};
use crate::types::{LicenseCategoryId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct LicenseCategories<'c> {
    db: &'c mut PgConnection,
}

impl<'c> LicenseCategories<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<LicenseCategoryDBResponse>> {
        let categories = sqlx::query_as::<_, LicenseCategoryDBResponse>(
            "SELECT id, code, name, description FROM license_categories ORDER BY name ASC",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(categories)
    }

    #[instrument(skip(self), fields(license_category_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: LicenseCategoryId) -> Result<Option<LicenseCategoryDBResponse>> {
        let category = sqlx::query_as::<_, LicenseCategoryDBResponse>(
            "SELECT id, code, name, description FROM license_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(category)
    }
}

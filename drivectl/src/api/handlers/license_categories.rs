use crate::AppState;
use crate::api::models::license_categories::LicenseCategoryResponse;
use crate::db::handlers::LicenseCategories;
use crate::errors::{Error, Result};
use crate::types::LicenseCategoryId;
use axum::{
    Json,
    extract::{Path, State},
};

#[utoipa::path(
    get,
    path = "/license-categories",
    tag = "license_categories",
    summary = "List license categories",
    responses(
        (status = 200, description = "All license categories", body = Vec<LicenseCategoryResponse>),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_license_categories(State(state): State<AppState>) -> Result<Json<Vec<LicenseCategoryResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let categories = LicenseCategories::new(&mut conn).list().await?;

    Ok(Json(categories.into_iter().map(LicenseCategoryResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/license-categories/{id}",
    tag = "license_categories",
    summary = "Get license category",
    params(("id" = uuid::Uuid, Path, description = "License category ID")),
    responses(
        (status = 200, description = "License category", body = LicenseCategoryResponse),
        (status = 404, description = "License category not found")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_license_category(State(state): State<AppState>, Path(id): Path<LicenseCategoryId>) -> Result<Json<LicenseCategoryResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let category = LicenseCategories::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "License category".to_string(),
            id: id.to_string(),
        })?;

    Ok(Json(category.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::models::license_categories::LicenseCategoryResponse;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_seeded_categories(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app.server.get("/admin/api/v1/license-categories").await;

        response.assert_status_ok();
        let categories: Vec<LicenseCategoryResponse> = response.json();
        let mut codes: Vec<_> = categories.iter().map(|c| c.code.as_str()).collect();
        codes.sort();
        assert_eq!(codes, vec!["A", "AB", "B", "C", "D", "E"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_category(pool: PgPool) {
        let id = license_category_id(&pool, "B").await;
        let app = create_test_app(pool).await;

        let response = app.server.get(&format!("/admin/api/v1/license-categories/{id}")).await;
        response.assert_status_ok();
        let category: LicenseCategoryResponse = response.json();
        assert_eq!(category.code, "B");

        let response = app
            .server
            .get(&format!("/admin/api/v1/license-categories/{}", Uuid::new_v4()))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}

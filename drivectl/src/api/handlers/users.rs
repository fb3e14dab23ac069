use crate::AppState;
use crate::api::models::profiles::{ProfileStatus, Role};
use crate::api::models::users::{DeleteUserAuthResponse, DeleteUserRequest, DeleteUserResponse};
use crate::db::handlers::{Profiles, Repository};
use crate::db::models::profiles::{ProfileCreateDBRequest, ProfileDBResponse};
use crate::errors::{Error, Result};
use crate::identity::NewIdentityUser;
use crate::types::abbrev_uuid;
use axum::{Json, extract::State};
use serde_json::json;
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

/// Identity fields shared by every entity that owns an account
pub(crate) struct NewAccount<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub role: Role,
}

impl NewAccount<'_> {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Name is required".to_string(),
            });
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::BadRequest {
                message: format!("Invalid email address '{email}'"),
            });
        }
        Ok(())
    }
}

/// Create the identity account and insert its profile on `conn`. The profile id is the account
/// id. Returns the profile; callers that fail afterwards must call [`release_account`].
pub(crate) async fn provision_account(state: &AppState, conn: &mut PgConnection, account: &NewAccount<'_>) -> Result<ProfileDBResponse> {
    account.validate()?;
    let identity = state.require_identity()?;

    let password = state
        .config
        .identity
        .initial_password
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let user_id = identity
        .create_user(&NewIdentityUser {
            email: account.email.trim().to_string(),
            password,
            email_confirm: state.config.identity.auto_confirm_email,
            user_metadata: json!({ "name": account.name, "role": account.role }),
        })
        .await?;

    let created = Profiles::new(conn)
        .create(&ProfileCreateDBRequest {
            id: Some(user_id),
            email: account.email.trim().to_string(),
            name: account.name.trim().to_string(),
            role: account.role,
            phone: account.phone.map(str::to_string),
            avatar_url: None,
            status: ProfileStatus::PendingFirstLogin,
        })
        .await;

    match created {
        Ok(profile) => Ok(profile),
        Err(e) => {
            release_account(state, user_id).await;
            Err(e.into())
        }
    }
}

/// Best-effort removal of an account created by [`provision_account`]
pub(crate) async fn release_account(state: &AppState, user_id: Uuid) {
    let Ok(identity) = state.require_identity() else {
        return;
    };
    if let Err(e) = identity.delete_user(user_id).await {
        warn!("Failed to remove identity account {} after a failed create: {}", abbrev_uuid(&user_id), e);
    }
}

fn parse_user_id(user_id: Option<&str>) -> Result<Uuid> {
    let user_id = user_id.map(str::trim).filter(|id| !id.is_empty()).ok_or_else(|| Error::BadRequest {
        message: "User ID is required".to_string(),
    })?;
    Uuid::parse_str(user_id).map_err(|_| Error::BadRequest {
        message: format!("Invalid user ID '{user_id}'"),
    })
}

#[utoipa::path(
    post,
    path = "/delete-user-auth",
    tag = "users",
    summary = "Delete identity account",
    description = "Delete only the identity account. Profile and records are left untouched.",
    request_body = DeleteUserRequest,
    responses(
        (status = 200, description = "Account deleted", body = DeleteUserAuthResponse),
        (status = 400, description = "Missing or malformed user ID"),
        (status = 500, description = "Identity service rejected the call or is not configured")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user_auth(State(state): State<AppState>, Json(request): Json<DeleteUserRequest>) -> Result<Json<DeleteUserAuthResponse>> {
    let user_id = parse_user_id(request.user_id.as_deref())?;
    let identity = state.require_identity()?;

    identity.delete_user(user_id).await?;
    info!("Deleted identity account {}", abbrev_uuid(&user_id));

    Ok(Json(DeleteUserAuthResponse {
        success: true,
        message: "User deleted successfully from Auth".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/delete-user",
    tag = "users",
    summary = "Delete user",
    description = "Delete a user's avatar, the records selected by `deleteType` with their dependent rows, the profile and the identity account.

Only a failure to delete the profile aborts the request. Every other failed step is listed in `warnings`.",
    request_body = DeleteUserRequest,
    responses(
        (status = 200, description = "User deleted", body = DeleteUserResponse),
        (status = 400, description = "Missing or malformed user ID"),
        (status = 404, description = "No profile with this ID"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(State(state): State<AppState>, Json(request): Json<DeleteUserRequest>) -> Result<Json<DeleteUserResponse>> {
    let user_id = parse_user_id(request.user_id.as_deref())?;
    let report = state.entity_deleter()?.delete_user(user_id, request.delete_type).await?;

    Ok(Json(DeleteUserResponse {
        success: true,
        message: "User deleted successfully".to_string(),
        report,
    }))
}

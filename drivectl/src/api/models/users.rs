//! Request/response bodies for the account deletion endpoints under `/api`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::deletion::{DeleteType, DeletionReport};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserRequest {
    /// Identity account id, which is also the profile id
    #[schema(example = "0b5f2b8e-5a0b-4b7e-9d57-9f0b6a0f3c11")]
    pub user_id: Option<String>,
    /// Which owned records to remove; defaults to all of them
    #[serde(default)]
    pub delete_type: DeleteType,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteUserAuthResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteUserResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub report: DeletionReport,
}

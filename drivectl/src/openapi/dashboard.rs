//! OpenAPI documentation for the dashboard maintenance endpoints (`/api/*`).

use utoipa::OpenApi;

use super::extra_types;
use crate::api;
use crate::api::models::{
    avatars::{
        AvatarUrlRequest, DebugAvatarUrlResponse, DeleteAvatarResponse, DirectoryView, DownloadCheck, ExtractionResult,
        FilePathRequest, ForceDeleteResponse, UrlAnalysis, VerifyFileResponse,
    },
    project::{BucketAccess, FolderListing, ListedFile, MissingSettings, ProjectInfo, VerifyProjectResponse},
    users::{DeleteUserAuthResponse, DeleteUserRequest, DeleteUserResponse},
};
use crate::avatars::{ResolutionMethod, Verification};
use crate::deletion::{DeleteType, DeletionReport};

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api", description = "Dashboard maintenance endpoints")
    ),
    paths(
        api::handlers::avatars::delete_avatar_admin,
        api::handlers::avatars::debug_avatar_url,
        api::handlers::avatars::verify_file_exists,
        api::handlers::avatars::force_delete_avatar,
        api::handlers::users::delete_user_auth,
        api::handlers::users::delete_user,
        api::handlers::project::verify_project,
    ),
    components(
        schemas(
            AvatarUrlRequest,
            FilePathRequest,
            DeleteAvatarResponse,
            DebugAvatarUrlResponse,
            UrlAnalysis,
            ExtractionResult,
            ResolutionMethod,
            Verification,
            VerifyFileResponse,
            DirectoryView,
            DownloadCheck,
            ForceDeleteResponse,
            DeleteUserRequest,
            DeleteType,
            DeleteUserAuthResponse,
            DeleteUserResponse,
            DeletionReport,
            VerifyProjectResponse,
            MissingSettings,
            ProjectInfo,
            BucketAccess,
            FolderListing,
            ListedFile,
            extra_types::ErrorResponse,
        )
    ),
    tags(
        (name = "avatars", description = "Avatar deletion and storage diagnostics"),
        (name = "users", description = "Account deletion"),
        (name = "project", description = "Backend configuration check"),
    ),
    info(
        title = "drivectl Dashboard API",
        version = "1.0.0",
        description = "Maintenance endpoints called by the dashboard front end. Bodies use camelCase.

Diagnostic endpoints report backend failures in the body as `{\"success\": false, \"message\": \"...\"}` with status 200.",
    )
)]
pub struct DashboardApiDoc;

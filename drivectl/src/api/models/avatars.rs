//! Request/response bodies for the avatar maintenance endpoints under `/api`.
//!
//! These endpoints are called by the dashboard front end, which sends and expects camelCase
//! keys. Failures of the storage backend are reported in-band (`success: false`) with status 200.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::avatars::{AvatarRemoval, ExistenceReport, ForceDeleteError, ForceDeleteReport, ResolutionMethod, ResolvedPath, Verification};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvatarUrlRequest {
    /// Stored avatar reference: a public URL, a bucket-relative path or a bare file name
    #[schema(example = "https://project.supabase.co/storage/v1/object/public/avatars/student-avatars/1700000000000-ana.png")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilePathRequest {
    /// Object key inside the avatar bucket
    #[schema(example = "student-avatars/1700000000000-ana.png")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAvatarResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_still_exists: Option<bool>,
    /// Directory listing when the object was still present after deletion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_files: Option<Vec<String>>,
}

impl From<AvatarRemoval> for DeleteAvatarResponse {
    fn from(removal: AvatarRemoval) -> Self {
        let success = removal.is_confirmed();
        let mut response = Self {
            success,
            message: removal.message,
            file_path: removal.resolved.map(|r| r.as_str().to_string()),
            verification_error: None,
            file_still_exists: None,
            remaining_files: None,
        };
        match removal.verification {
            Some(Verification::StillPresent { remaining }) => {
                response.file_still_exists = Some(true);
                response.remaining_files = Some(remaining);
            }
            Some(Verification::Unverifiable { error }) => response.verification_error = Some(error),
            Some(Verification::Gone) | None => {}
        }
        response
    }
}

/// Observations about the raw reference, independent of the resolution rules
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UrlAnalysis {
    pub original_url: String,
    pub length: usize,
    pub contains_public_url_marker: bool,
    pub contains_path_token: bool,
    pub contains_student_prefix: bool,
    /// Extension of the last segment, lowercased
    pub file_extension: Option<String>,
    pub url_parts: Vec<String>,
    pub last_part: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// Path produced by the resolver
    pub file_path: Option<String>,
    /// Key the delete call would target inside the avatar bucket
    pub object_key: Option<String>,
    pub extraction_method: Option<ResolutionMethod>,
    pub extraction_success: bool,
}

impl ExtractionResult {
    pub fn new(resolved: Option<&ResolvedPath>, bucket: &str) -> Self {
        Self {
            file_path: resolved.map(|r| r.as_str().to_string()),
            object_key: resolved.map(|r| r.object_key(bucket).to_string()),
            extraction_method: resolved.map(ResolvedPath::method),
            extraction_success: resolved.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebugAvatarUrlResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_analysis: Option<UrlAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_result: Option<ExtractionResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    /// The request body, echoed back when it carried no reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyFileResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_in_directory: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyFileResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

impl From<ExistenceReport> for VerifyFileResponse {
    fn from(report: ExistenceReport) -> Self {
        let message = match (report.exists, report.download_error.is_some()) {
            (true, false) => "File exists and can be downloaded",
            (true, true) => "File found in directory listing",
            (false, _) => "File not found in directory listing",
        };
        let downloaded = report.download_error.is_none();
        Self {
            success: true,
            message: message.to_string(),
            file_exists: Some(report.exists),
            file_path: Some(report.file_path),
            directory_path: (!downloaded).then_some(report.directory_path),
            file_name: (!downloaded).then_some(report.file_name),
            file_size: report.size,
            file_type: report.content_type.or_else(|| downloaded.then(|| "unknown".to_string())),
            download_error: report.download_error,
            files_in_directory: report.files_in_directory,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryView {
    pub file_exists: bool,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadCheck {
    pub works: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForceDeleteResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_exists_before: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<DirectoryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<DirectoryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_successful: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForceDeleteResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn from_error(file_path: &str, error: ForceDeleteError) -> Self {
        Self {
            file_path: Some(file_path.to_string()),
            error: Some(error.source.to_string()),
            ..Self::failure(error.stage.describe())
        }
    }
}

impl From<ForceDeleteReport> for ForceDeleteResponse {
    fn from(report: ForceDeleteReport) -> Self {
        let deletion_successful = report.deletion_successful();
        let Some(files_after) = report.files_after else {
            return Self {
                success: true,
                message: "File no longer exists".to_string(),
                file_path: Some(report.file_path),
                file_exists_before: Some(false),
                ..Default::default()
            };
        };

        let message = if report.exists_after {
            "File still exists after deletion"
        } else {
            "File deleted successfully"
        };

        Self {
            success: true,
            message: message.to_string(),
            file_path: Some(report.file_path),
            file_name: Some(report.file_name),
            file_exists_before: Some(report.existed_before),
            before: Some(DirectoryView {
                file_exists: report.existed_before,
                files: report.files_before,
            }),
            after: Some(DirectoryView {
                file_exists: report.exists_after,
                files: files_after,
            }),
            download: Some(DownloadCheck {
                works: report.download_works,
                error: report.download_error,
            }),
            deletion_successful: Some(deletion_successful),
            error: None,
        }
    }
}

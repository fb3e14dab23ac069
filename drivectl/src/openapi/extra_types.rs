//! Documentation-only schemas.
//!
//! Error bodies are produced by [`crate::errors::Error`]'s `IntoResponse` impl from a `json!`
//! literal, so their shape is declared here for the generated docs.

use serde::Serialize;
use utoipa::ToSchema;

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "error": "Environment variables not configured",
    "details": "SUPABASE_SERVICE_ROLE_KEY is not configured"
}))]
pub struct ErrorResponse {
    /// Short, user-facing summary
    pub error: String,

    /// Diagnostic detail. Omitted for client errors (400, 404, 413).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

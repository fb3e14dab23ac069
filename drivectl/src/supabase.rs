//! Shared HTTP client for the backend-as-a-service REST APIs.
//!
//! A single [`SupabaseClient`] is built at startup and shared by the storage and identity
//! backends. It owns the `reqwest` connection pool, the project URL and the service-role key, and
//! attaches the `apikey` / `Authorization` headers every admin call needs.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::SupabaseConfig;

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    service_role_key: String,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Names of the settings that must be present before a client can be built.
pub fn missing_settings(config: &SupabaseConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if config.url.is_none() {
        missing.push("SUPABASE_URL");
    }
    if config.service_role_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
        missing.push("SUPABASE_SERVICE_ROLE_KEY");
    }
    missing
}

impl SupabaseClient {
    pub fn new(base_url: Url, service_role_key: impl Into<String>, request_timeout: Duration) -> anyhow::Result<Self> {
        install_crypto_provider();
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: ensure_slash(&base_url),
            service_role_key: service_role_key.into(),
        })
    }

    /// Build a client from configuration. Returns `None` when the URL or key is absent; requests
    /// that need the backend then fail with a configuration error.
    pub fn from_config(config: &SupabaseConfig) -> anyhow::Result<Option<Self>> {
        match (&config.url, &config.service_role_key) {
            (Some(url), Some(key)) if !key.trim().is_empty() => Ok(Some(Self::new(url.clone(), key.clone(), config.request_timeout)?)),
            _ => Ok(None),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The project reference, i.e. the first label of the project host.
    pub fn project_ref(&self) -> Option<&str> {
        self.base_url.host_str().and_then(|host| host.split('.').next())
    }

    /// Resolve `path` (no leading slash) against the project URL.
    pub fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| anyhow::anyhow!("Failed to construct backend URL for '{}': {}", path, e))
    }

    /// Start an authenticated request against `path` (relative to the project URL).
    pub fn request(&self, method: Method, path: &str) -> anyhow::Result<RequestBuilder> {
        Ok(self.request_to(method, self.endpoint(path)?))
    }

    /// Start an authenticated request against an already built URL.
    pub fn request_to(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }
}

/// Error body shapes returned by the storage and auth APIs.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: Option<String>,
}

/// A non-success response, reduced to its status and the most specific message available.
#[derive(Debug, Clone)]
pub struct BackendFailure {
    pub status: StatusCode,
    pub message: String,
    /// Machine-readable error code when the backend sent one (`error` field or string status code)
    pub code: Option<String>,
}

impl BackendFailure {
    pub async fn from_response(response: Response) -> Self {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Self::from_parts(status, &text)
    }

    pub fn from_parts(status: StatusCode, text: &str) -> Self {
        let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
        let message = body
            .message
            .or(body.msg)
            .or(body.error_description)
            .or_else(|| body.error.clone())
            .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text.to_string() });
        Self {
            status,
            message,
            code: body.error.or(body.status_code),
        }
    }

    /// True for the "object does not exist" family of responses.
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
            || self.code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case("not_found") || c == "404")
            || self.message.to_ascii_lowercase().contains("not found")
    }
}

/// Makes sure a url has a trailing slash, so that `join` appends instead of replacing the last
/// path segment.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

/// reqwest is built without a bundled crypto provider; install the process default if nobody has.
fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        // Losing the race to another installer is fine.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_settings() {
        let mut config = SupabaseConfig::default();
        assert_eq!(missing_settings(&config), vec!["SUPABASE_URL", "SUPABASE_SERVICE_ROLE_KEY"]);

        config.url = Some(Url::parse("https://abcd.supabase.co").unwrap());
        config.service_role_key = Some("  ".to_string());
        assert_eq!(missing_settings(&config), vec!["SUPABASE_SERVICE_ROLE_KEY"]);

        config.service_role_key = Some("key".to_string());
        assert!(missing_settings(&config).is_empty());
        assert!(SupabaseClient::from_config(&config).unwrap().is_some());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = SupabaseClient::new(Url::parse("http://localhost:54321/proxy").unwrap(), "key", Duration::from_secs(1)).unwrap();
        let url = client.endpoint("/storage/v1/object/avatars").unwrap();
        assert_eq!(url.as_str(), "http://localhost:54321/proxy/storage/v1/object/avatars");
    }

    #[test]
    fn test_project_ref() {
        let client = SupabaseClient::new(Url::parse("https://abcd1234.supabase.co").unwrap(), "key", Duration::from_secs(1)).unwrap();
        assert_eq!(client.project_ref(), Some("abcd1234"));
    }

    #[test]
    fn test_backend_failure_messages() {
        let failure = BackendFailure::from_parts(
            StatusCode::BAD_REQUEST,
            r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#,
        );
        assert_eq!(failure.message, "Object not found");
        assert!(failure.is_not_found());

        let failure = BackendFailure::from_parts(StatusCode::FORBIDDEN, r#"{"msg":"User not allowed"}"#);
        assert_eq!(failure.message, "User not allowed");
        assert!(!failure.is_not_found());

        let failure = BackendFailure::from_parts(StatusCode::BAD_GATEWAY, "");
        assert_eq!(failure.message, "502 Bad Gateway");
    }
}

//! Identity service administration.
//!
//! Accounts live in the backend's auth service; profile rows reuse the account id as their primary
//! key. Only the two admin calls the dashboard needs are modelled: create and delete.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::supabase::{BackendFailure, SupabaseClient};
use crate::types::abbrev_uuid;

/// Result type for identity operations
pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("User {id} not found in identity service")]
    NotFound { id: Uuid },

    /// The identity service rejected the call; `message` is its own message
    #[error("{message}")]
    Backend { status: Option<u16>, message: String },

    #[error("Identity request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Account to create through the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct NewIdentityUser {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: serde_json::Value,
}

#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    /// Create an account and return its id
    async fn create_user(&self, user: &NewIdentityUser) -> Result<Uuid>;

    async fn delete_user(&self, id: Uuid) -> Result<()>;
}

/// Auth admin API (`/auth/v1/admin/users`).
pub struct SupabaseIdentity {
    client: SupabaseClient,
}

#[derive(Debug, Deserialize)]
struct CreatedUser {
    id: Uuid,
}

impl SupabaseIdentity {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn failure(failure: BackendFailure) -> IdentityError {
        IdentityError::Backend {
            status: Some(failure.status.as_u16()),
            message: failure.message,
        }
    }
}

#[async_trait]
impl IdentityAdmin for SupabaseIdentity {
    #[instrument(skip(self, user), fields(email = %user.email), err)]
    async fn create_user(&self, user: &NewIdentityUser) -> Result<Uuid> {
        let response = self.client.request(Method::POST, "auth/v1/admin/users")?.json(user).send().await?;

        if !response.status().is_success() {
            return Err(Self::failure(BackendFailure::from_response(response).await));
        }

        let created: CreatedUser = response.json().await?;
        info!("Created identity user {}", abbrev_uuid(&created.id));
        Ok(created.id)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let response = self
            .client
            .request(Method::DELETE, &format!("auth/v1/admin/users/{id}"))?
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(IdentityError::NotFound { id }),
            _ => Err(Self::failure(BackendFailure::from_response(response).await)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity(server: &MockServer) -> SupabaseIdentity {
        let client = SupabaseClient::new(Url::parse(&server.uri()).unwrap(), "service-key", Duration::from_secs(5)).unwrap();
        SupabaseIdentity::new(client)
    }

    #[tokio::test]
    async fn test_create_user_returns_id() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/auth/v1/admin/users"))
            .and(header("apikey", "service-key"))
            .and(body_partial_json(json!({
                "email": "ana@example.com",
                "email_confirm": true,
                "user_metadata": { "role": "student" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id, "email": "ana@example.com" })))
            .expect(1)
            .mount(&server)
            .await;

        let created = identity(&server)
            .create_user(&NewIdentityUser {
                email: "ana@example.com".to_string(),
                password: "temporary".to_string(),
                email_confirm: true,
                user_metadata: json!({ "role": "student" }),
            })
            .await
            .unwrap();
        assert_eq!(created, id);
    }

    #[tokio::test]
    async fn test_create_user_surfaces_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "code": 422,
                "error_code": "email_exists",
                "msg": "A user with this email address has already been registered"
            })))
            .mount(&server)
            .await;

        let err = identity(&server)
            .create_user(&NewIdentityUser {
                email: "ana@example.com".to_string(),
                password: "temporary".to_string(),
                email_confirm: true,
                user_metadata: json!({}),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "A user with this email address has already been registered");
    }

    #[tokio::test]
    async fn test_delete_user() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("DELETE"))
            .and(path(format!("/auth/v1/admin/users/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        identity(&server).delete_user(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "msg": "User not found" })))
            .mount(&server)
            .await;

        let id = Uuid::new_v4();
        let err = identity(&server).delete_user(id).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotFound { id: missing } if missing == id));
    }
}

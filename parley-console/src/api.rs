/// Typed client for the `/api/admin` surface
///
/// A thin reqwest wrapper: every method mirrors one REST operation,
/// decodes the shared response projections, and turns non-success
/// responses into [`ClientError::Api`] carrying the server's error code
/// and message. Failures from state-changing calls feed straight into the
/// rollback phase of the optimistic protocol (`optimistic::settle`).

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use parley_shared::directory::{DirectoryPage, ListUsersParams};
use parley_shared::models::user::UserView;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cache::QueryKey;
use crate::optimistic::QueryFetcher;

/// Client-side error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection, decoding)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error status
    #[error("API error ({status} {code}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Machine-readable error code from the body
        code: String,
        /// Operator-facing message
        message: String,
    },
}

/// Server error body shape
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Create-user payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    /// Email address
    pub email: String,

    /// Plaintext password (sent over TLS, hashed server-side)
    pub password: String,

    /// Login handle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Requested role (global scope only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Generic-update payload
///
/// `membership_expires_at` uses the same tri-state convention as the
/// server: skip the field to leave the expiration alone, send `null` to
/// clear it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    /// New display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// New membership expiration (null clears)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_expires_at: Option<Option<chrono::DateTime<chrono::Utc>>>,
}

/// Add-to-organization payload
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberPayload {
    /// Target user (global scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,

    /// Target organization (global scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,

    /// Target email (organization scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Create-user response body
#[derive(Debug, Deserialize)]
pub struct CreatedUser {
    /// The created user
    pub user: UserView,
}

/// Delete-user response body
#[derive(Debug, Deserialize)]
pub struct DeletedUser {
    /// Whether the record was removed
    pub deleted: bool,
}

/// Admin API client
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl AdminClient {
    /// Creates a client for a base URL and bearer token
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Full URL for a request path under the admin namespace
    fn url(&self, path: &str) -> String {
        format!("{}/api/admin/{}", self.base_url, path)
    }

    /// Decodes a response, mapping error statuses to [`ClientError::Api`]
    async fn handle<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.json::<ErrorBody>().await.unwrap_or(ErrorBody {
            error: "unknown".to_string(),
            message: "Unrecognized error response".to_string(),
        });

        Err(ClientError::Api {
            status: status.as_u16(),
            code: body.error,
            message: body.message,
        })
    }

    /// Lists users with the caller's scope applied server-side
    pub async fn list_users(&self, params: &ListUsersParams) -> Result<DirectoryPage, ClientError> {
        let response = self
            .http
            .get(self.url("users"))
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Fetches a single user
    pub async fn get_user(&self, id: Uuid) -> Result<UserView, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("users/{}", id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Creates a user
    pub async fn create_user(&self, payload: &CreateUserPayload) -> Result<CreatedUser, ClientError> {
        let response = self
            .http
            .post(self.url("users"))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Resets a user's password
    pub async fn reset_password(&self, id: Uuid, password: &str) -> Result<UserView, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("users/{}/password", id)))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Changes a user's role
    pub async fn change_role(&self, id: Uuid, role: &str) -> Result<UserView, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("users/{}/role", id)))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "role": role }))
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Bans or unbans a user
    pub async fn set_ban_status(&self, id: Uuid, banned: bool) -> Result<UserView, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("users/{}/status", id)))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "banned": banned }))
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Applies a generic update
    pub async fn update_user(
        &self,
        id: Uuid,
        payload: &UpdateUserPayload,
    ) -> Result<UserView, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("users/{}", id)))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Deletes a user (the server runs the cascade before answering)
    pub async fn delete_user(&self, id: Uuid) -> Result<DeletedUser, ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("users/{}", id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Adds a user to an organization
    pub async fn add_to_organization(
        &self,
        payload: &AddMemberPayload,
    ) -> Result<UserView, ClientError> {
        let response = self
            .http
            .post(self.url("users/organization/add"))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Removes a user from its organization
    pub async fn remove_from_organization(&self, user_id: Uuid) -> Result<UserView, ClientError> {
        let response = self
            .http
            .post(self.url("users/organization/remove"))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "userId": user_id }))
            .send()
            .await?;
        Self::handle(response).await
    }
}

impl QueryFetcher for AdminClient {
    /// Replays a cached request verbatim for reconciliation
    fn fetch<'a>(&'a self, key: &'a QueryKey) -> LocalBoxFuture<'a, Result<Value, ClientError>> {
        async move {
            let response = self
                .http
                .get(self.url(&key.request))
                .bearer_auth(&self.token)
                .send()
                .await?;
            Self::handle(response).await
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryFamily;

    #[test]
    fn test_url_joins_without_double_slashes() {
        let client = AdminClient::new("https://parley.example/", "token");
        assert_eq!(
            client.url("users"),
            "https://parley.example/api/admin/users"
        );
        assert_eq!(
            client.url("users/organization/add"),
            "https://parley.example/api/admin/users/organization/add"
        );
    }

    #[test]
    fn test_payloads_serialize_to_camel_case_and_skip_absent_fields() {
        let payload = AddMemberPayload {
            email: Some("user@x.com".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"email": "user@x.com"}));

        let payload = UpdateUserPayload {
            name: Some("New Name".to_string()),
            membership_expires_at: Some(None),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "New Name", "membershipExpiresAt": null})
        );
    }

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Api {
            status: 409,
            code: "conflict".to_string(),
            message: "Email already exists".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (409 conflict): Email already exists"
        );
    }

    #[test]
    fn test_query_key_request_round_trip() {
        let key = QueryKey::new(QueryFamily::Users, "users?page=2&limit=50");
        let client = AdminClient::new("https://parley.example", "token");
        assert_eq!(
            client.url(&key.request),
            "https://parley.example/api/admin/users?page=2&limit=50"
        );
    }
}

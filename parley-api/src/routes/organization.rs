/// Organization membership endpoints
///
/// Two asymmetric entry points converge on the membership coordinator:
///
/// - Global scope adds and removes **by identity** (`userId` plus an
///   optional `organizationId`).
/// - Organization scope adds **by email only** — the target is always
///   attached to the caller's own organization — and removes by identity
///   within its own boundary.
///
/// # Endpoints
///
/// - `POST /api/admin/users/organization/add`
/// - `POST /api/admin/users/organization/remove`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use parley_shared::{
    auth::guards::AdminActor,
    membership,
    models::user::UserView,
};
use serde::Deserialize;
use uuid::Uuid;

/// Add-to-organization request
///
/// Global scope sends `userId` + `organizationId`; organization scope
/// sends `email` only.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    /// Target user (global scope)
    pub user_id: Option<Uuid>,

    /// Target organization (global scope)
    pub organization_id: Option<Uuid>,

    /// Target email (organization scope)
    pub email: Option<String>,
}

/// Remove-from-organization request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    /// Target user
    pub user_id: Uuid,
}

/// Adds a user to an organization
///
/// # Errors
///
/// - `400 Bad Request`: missing the fields this scope requires
/// - `403 Forbidden`: protected administrator target
/// - `404 Not Found`: unknown user or organization
/// - `409 Conflict`: target already belongs to an organization
pub async fn add_member(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<Json<UserView>> {
    let view = match &actor {
        AdminActor::Global { .. } => {
            let user_id = req.user_id.ok_or_else(|| {
                ApiError::BadRequest("userId is required".to_string())
            })?;
            let organization_id = req.organization_id.ok_or_else(|| {
                ApiError::BadRequest("organizationId is required".to_string())
            })?;

            membership::assign(&state.db, user_id, organization_id).await?
        }
        AdminActor::Organization {
            organization_id, ..
        } => {
            let email = req
                .email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "Organization admins add members by email".to_string(),
                    )
                })?;

            membership::add_by_email(&state.db, *organization_id, &email.to_lowercase()).await?
        }
    };

    Ok(Json(view))
}

/// Removes a user from its organization
///
/// # Errors
///
/// - `400 Bad Request`: target has no organization (global scope)
/// - `403 Forbidden`: self-target, peer org admin, or boundary violation
/// - `404 Not Found`: unknown user
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Json(req): Json<RemoveMemberRequest>,
) -> ApiResult<Json<UserView>> {
    let view = match &actor {
        AdminActor::Global { .. } => membership::remove(&state.db, req.user_id).await?,
        AdminActor::Organization {
            user_id,
            organization_id,
        } => {
            membership::remove_scoped(&state.db, *user_id, *organization_id, req.user_id).await?
        }
    };

    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_accepts_either_shape() {
        let by_identity: AddMemberRequest = serde_json::from_str(
            r#"{"userId": "550e8400-e29b-41d4-a716-446655440000",
                "organizationId": "550e8400-e29b-41d4-a716-446655440001"}"#,
        )
        .unwrap();
        assert!(by_identity.user_id.is_some());
        assert!(by_identity.email.is_none());

        let by_email: AddMemberRequest =
            serde_json::from_str(r#"{"email": "user@x.com"}"#).unwrap();
        assert!(by_email.user_id.is_none());
        assert_eq!(by_email.email.as_deref(), Some("user@x.com"));
    }
}

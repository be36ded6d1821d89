/// Admin user endpoints
///
/// The shared route shape for both operator scopes. The admin gate has
/// already resolved the caller's capability into an [`AdminActor`]; every
/// handler here branches on that actor, runs the guard chain against a
/// freshly loaded target row, and answers with a credential-stripped
/// [`UserView`].
///
/// # Endpoints
///
/// - `GET    /api/admin/users` - scoped directory listing
/// - `POST   /api/admin/users` - create user
/// - `GET    /api/admin/users/:id`
/// - `PUT    /api/admin/users/:id` - generic update
/// - `DELETE /api/admin/users/:id` - delete with cascading cleanup
/// - `PUT    /api/admin/users/:id/password`
/// - `PUT    /api/admin/users/:id/role`
/// - `PUT    /api/admin/users/:id/status`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use parley_shared::{
    auth::guards::{AdminActor, AdminCommand, TargetUser},
    auth::password,
    cleanup,
    directory::{self, DirectoryPage, ListUsersParams},
    models::{
        organization::Organization,
        session::Session,
        user::{CreateUser, UpdateUser, User, UserRole, UserView},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Create user request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Plaintext password; hashed before persistence, never logged
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Login handle
    #[validate(length(max = 80, message = "Username must be at most 80 characters"))]
    pub username: Option<String>,

    /// Display name
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: Option<String>,

    /// Requested role; organization scope always creates plain users
    pub role: Option<String>,
}

/// Create user response
#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    /// The created user, credential-stripped
    pub user: UserView,
}

/// Reset password request
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    /// New plaintext password
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Change role request
#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    /// New role ("USER" or "ORG_ADMIN")
    pub role: String,
}

/// Set ban status request
#[derive(Debug, Deserialize)]
pub struct SetBanStatusRequest {
    /// Desired banned flag
    pub banned: bool,
}

/// Generic update request
///
/// `membershipExpiresAt` is tri-state: absent leaves the expiration
/// untouched, `null` clears it, a timestamp replaces it.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    /// New display name
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: Option<String>,

    /// New membership expiration (null clears)
    #[serde(default, deserialize_with = "double_option")]
    pub membership_expires_at: Option<Option<DateTime<Utc>>>,
}

/// Delete user response
#[derive(Debug, Serialize)]
pub struct DeleteUserResponse {
    /// Whether the user record was removed
    pub deleted: bool,
}

/// Deserializes a field that distinguishes "absent" from "null"
///
/// With `#[serde(default)]`, a missing field stays `None` while an
/// explicit `null` becomes `Some(None)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Loads the target row for a mutation, fresh per request
async fn load_target(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Attaches the organization display name to a single projection
async fn enrich_view(state: &AppState, view: UserView) -> Result<UserView, ApiError> {
    if let Some(org_id) = view.organization_id {
        let name = Organization::find_by_id(&state.db, org_id)
            .await?
            .map(|org| org.name);
        return Ok(view.with_organization_name(name));
    }
    Ok(view)
}

/// Scoped directory listing
///
/// Pagination, search, filters, and sorting are all forgiving: sizes are
/// clamped, unknown filter values are ignored. The caller's scope decides
/// which status semantics apply and whether organization enrichment runs.
///
/// # Errors
///
/// - `500 Internal Server Error`: store failure
pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Query(params): Query<ListUsersParams>,
) -> ApiResult<Json<DirectoryPage>> {
    let scope = actor.directory_scope();
    let page = directory::list_users(&state.db, &scope, &params).await?;
    Ok(Json(page))
}

/// Fetches a single user
///
/// In organization scope the lookup is pinned to the caller's
/// organization and top-level administrators stay invisible, so a foreign
/// or protected target reads as absent.
///
/// # Errors
///
/// - `404 Not Found`: unknown user, or outside the caller's view
pub async fn get_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserView>> {
    let user = load_target(&state, id).await?;

    if let Some(org_id) = actor.organization_id() {
        if user.organization_id != Some(org_id) || user.role.is_admin() {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
    }

    let view = enrich_view(&state, UserView::from(user)).await?;
    Ok(Json(view))
}

/// Creates a user
///
/// Global scope may assign USER or ORG_ADMIN; the top-level administrator
/// role is not creatable through this surface. Organization scope always
/// creates a plain USER attached to the caller's own organization.
///
/// # Errors
///
/// - `400 Bad Request`: validation failed, unknown or forbidden role
/// - `409 Conflict`: email already exists
pub async fn create_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<CreateUserResponse>)> {
    req.validate()?;

    password::validate_password_strength(&req.password).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message,
        }])
    })?;

    let (role, organization_id) = match &actor {
        AdminActor::Global { .. } => (resolve_grantable_role(req.role.as_deref())?, None),
        AdminActor::Organization {
            organization_id, ..
        } => (UserRole::User, Some(*organization_id)),
    };

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_lowercase(),
            password_hash,
            username: req.username,
            name: req.name,
            role,
            organization_id,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, role = %role.as_str(), "User created");

    let view = enrich_view(&state, UserView::from(user)).await?;
    Ok((StatusCode::CREATED, Json(CreateUserResponse { user: view })))
}

/// Resolves the role of a globally created user
fn resolve_grantable_role(requested: Option<&str>) -> Result<UserRole, ApiError> {
    match requested {
        None => Ok(UserRole::User),
        Some(raw) => match UserRole::from_str(raw) {
            Some(UserRole::Admin) => Err(ApiError::ValidationError(vec![ValidationErrorDetail {
                field: "role".to_string(),
                message: "The administrator role cannot be assigned here".to_string(),
            }])),
            Some(role) => Ok(role),
            None => Err(ApiError::ValidationError(vec![ValidationErrorDetail {
                field: "role".to_string(),
                message: format!("Unknown role: {}", raw),
            }])),
        },
    }
}

/// Resets a user's password
///
/// The plaintext goes through Argon2id exactly once and is never logged
/// or echoed back.
///
/// # Errors
///
/// - `400 Bad Request`: weak password
/// - `403 Forbidden`: protected administrator or org boundary
/// - `404 Not Found`: unknown user
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<UserView>> {
    req.validate()?;

    password::validate_password_strength(&req.password).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message,
        }])
    })?;

    let target = load_target(&state, id).await?;
    actor.authorize(AdminCommand::ResetPassword, &TargetUser::from(&target))?;

    let password_hash = password::hash_password(&req.password)?;

    let updated = User::set_password_hash(&state.db, id, &password_hash)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, "Password reset");

    Ok(Json(UserView::from(updated)))
}

/// Changes a user's role
///
/// Only USER and ORG_ADMIN are grantable; organization scope cannot use
/// this command at all (the guard redirects it to the expiration
/// mechanism).
///
/// # Errors
///
/// - `400 Bad Request`: unknown or forbidden role value
/// - `403 Forbidden`: self-target, protected administrator, scope restriction
pub async fn change_role(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<UserView>> {
    let role = resolve_grantable_role(Some(&req.role))?;

    let target = load_target(&state, id).await?;
    actor.authorize(AdminCommand::ChangeRole, &TargetUser::from(&target))?;

    let updated = User::set_role(&state.db, id, role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, role = %role.as_str(), "Role changed");

    Ok(Json(UserView::from(updated)))
}

/// Bans or unbans a user
///
/// Setting `banned: true` also revokes the target's active sessions.
/// That revocation is best-effort: a failure is logged and never rolls
/// back or fails the status change itself.
///
/// # Errors
///
/// - `403 Forbidden`: self-target, protected administrator, scope restriction
/// - `404 Not Found`: unknown user
pub async fn set_ban_status(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetBanStatusRequest>,
) -> ApiResult<Json<UserView>> {
    let target = load_target(&state, id).await?;
    actor.authorize(AdminCommand::SetBanStatus, &TargetUser::from(&target))?;

    let updated = User::set_banned(&state.db, id, req.banned)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if req.banned {
        match Session::revoke_all_for_user(&state.db, id).await {
            Ok(revoked) => {
                tracing::info!(user_id = %id, revoked, "Sessions invalidated for banned user");
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %id,
                    error = %e,
                    "Session invalidation failed after ban; status change stands"
                );
            }
        }
    }

    tracing::info!(user_id = %id, banned = req.banned, "Ban status updated");

    Ok(Json(UserView::from(updated)))
}

/// Generic update: display name and/or membership expiration
///
/// # Errors
///
/// - `400 Bad Request`: no updatable field present
/// - `403 Forbidden`: self-target, protected administrator, org boundary
/// - `404 Not Found`: unknown user
pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserView>> {
    req.validate()?;

    if req.name.is_none() && req.membership_expires_at.is_none() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let target = load_target(&state, id).await?;
    actor.authorize(AdminCommand::Update, &TargetUser::from(&target))?;

    let updated = User::update(
        &state.db,
        id,
        UpdateUser {
            name: req.name,
            membership_expires_at: req.membership_expires_at,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let view = enrich_view(&state, UserView::from(updated)).await?;
    Ok(Json(view))
}

/// Deletes a user
///
/// Fires the cascading cleanup over every dependent resource family,
/// waits for the whole batch to settle, then removes the user record.
/// Individual cleanup failures are logged and never block the delete.
///
/// # Errors
///
/// - `403 Forbidden`: self-target, protected administrator, org boundary
/// - `404 Not Found`: unknown user
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteUserResponse>> {
    let target = load_target(&state, id).await?;
    actor.authorize(AdminCommand::Delete, &TargetUser::from(&target))?;

    let deleted = cleanup::delete_user_with_cleanup(&state.db, id).await?;

    if !deleted {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %id, "User deleted");

    Ok(Json(DeleteUserResponse { deleted: true }))
}

/// Organization membership coordinator
///
/// Maintains the single-organization-per-user invariant across two
/// asymmetric write paths:
///
/// - **By identity** (global scope): the caller names a user and an
///   organization, or omits the organization to mean removal.
/// - **By email** (organization scope): the caller supplies only an email
///   address and the target is attached to the caller's own organization —
///   this path can never name an arbitrary organization.
///
/// State checks are pure functions over a snapshot of the target row
/// (`check_*`), re-read per request; the async entry points wire them to
/// the actual writes. Every path returns the credential-stripped user
/// projection, with the organization display name attached when relevant.

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::guards::{authorize_command, AdminCapability, AdminCommand, GuardError, TargetUser};
use crate::models::organization::Organization;
use crate::models::user::{User, UserView};

/// Coordinator failure modes
///
/// "Already in your organization" and "belongs to a different
/// organization" are deliberately distinct outcomes; the console shows
/// different guidance for each.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// No user matched the given ID or email
    #[error("User not found")]
    UserNotFound,

    /// The named organization does not exist
    #[error("Organization not found")]
    OrganizationNotFound,

    /// Assignment names the organization the user already has
    #[error("User is already a member of this organization")]
    AlreadyAssigned,

    /// Add-by-email target already belongs to the caller's organization
    #[error("User is already a member of your organization")]
    AlreadyInYourOrganization,

    /// Add-by-email target belongs to some other organization
    #[error("User already belongs to a different organization")]
    MemberOfOtherOrganization,

    /// Removal requested for a user with no organization
    #[error("User does not belong to any organization")]
    NoOrganization,

    /// A guard rejected the command
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// Underlying store failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// State check for assignment by identity
///
/// Rejects protected administrators and redundant assignment.
pub fn check_assignment(target: &TargetUser, organization_id: Uuid) -> Result<(), MembershipError> {
    if target.role.is_admin() {
        return Err(GuardError::ProtectedAdministrator.into());
    }

    if target.organization_id == Some(organization_id) {
        return Err(MembershipError::AlreadyAssigned);
    }

    Ok(())
}

/// State check for removal by identity (global scope)
pub fn check_removal(target: &TargetUser) -> Result<(), MembershipError> {
    if target.role.is_admin() {
        return Err(GuardError::ProtectedAdministrator.into());
    }

    if target.organization_id.is_none() {
        return Err(MembershipError::NoOrganization);
    }

    Ok(())
}

/// State check for the add-by-email path
///
/// Distinguishes "already in your organization" from "already in a
/// different organization" as two distinct outcomes.
pub fn check_add_by_email(
    target: &TargetUser,
    caller_organization: Uuid,
) -> Result<(), MembershipError> {
    if target.role.is_admin() {
        return Err(GuardError::ProtectedAdministrator.into());
    }

    match target.organization_id {
        Some(current) if current == caller_organization => {
            Err(MembershipError::AlreadyInYourOrganization)
        }
        Some(_) => Err(MembershipError::MemberOfOtherOrganization),
        None => Ok(()),
    }
}

/// Assigns a user to an organization (global scope)
///
/// Both the user and the organization must exist; assigning the
/// organization the user already has is a conflict.
///
/// # Errors
///
/// Returns a [`MembershipError`] describing the first failed check
pub async fn assign(
    pool: &PgPool,
    user_id: Uuid,
    organization_id: Uuid,
) -> Result<UserView, MembershipError> {
    let user = User::find_by_id(pool, user_id)
        .await?
        .ok_or(MembershipError::UserNotFound)?;

    check_assignment(&TargetUser::from(&user), organization_id)?;

    let organization = Organization::find_by_id(pool, organization_id)
        .await?
        .ok_or(MembershipError::OrganizationNotFound)?;

    let updated = User::set_organization(pool, user_id, Some(organization_id))
        .await?
        .ok_or(MembershipError::UserNotFound)?;

    tracing::info!(
        user_id = %user_id,
        organization_id = %organization_id,
        "User assigned to organization"
    );

    Ok(UserView::from(updated).with_organization_name(Some(organization.name)))
}

/// Removes a user from its organization (global scope)
///
/// # Errors
///
/// Returns `NoOrganization` if the user has no organization to leave
pub async fn remove(pool: &PgPool, user_id: Uuid) -> Result<UserView, MembershipError> {
    let user = User::find_by_id(pool, user_id)
        .await?
        .ok_or(MembershipError::UserNotFound)?;

    check_removal(&TargetUser::from(&user))?;

    let updated = User::set_organization(pool, user_id, None)
        .await?
        .ok_or(MembershipError::UserNotFound)?;

    tracing::info!(user_id = %user_id, "User removed from organization");

    Ok(UserView::from(updated))
}

/// Adds a user to the caller's organization by email (organization scope)
///
/// The caller has no way to name an organization here: resolution always
/// attaches the target to `caller_organization`.
///
/// # Errors
///
/// Returns `UserNotFound` for an unknown email and a distinct error for
/// each already-assigned case
pub async fn add_by_email(
    pool: &PgPool,
    caller_organization: Uuid,
    email: &str,
) -> Result<UserView, MembershipError> {
    let user = User::find_by_email(pool, email)
        .await?
        .ok_or(MembershipError::UserNotFound)?;

    check_add_by_email(&TargetUser::from(&user), caller_organization)?;

    let organization = Organization::find_by_id(pool, caller_organization)
        .await?
        .ok_or(MembershipError::OrganizationNotFound)?;

    let updated = User::set_organization(pool, user.id, Some(caller_organization))
        .await?
        .ok_or(MembershipError::UserNotFound)?;

    tracing::info!(
        user_id = %updated.id,
        organization_id = %caller_organization,
        "User added to organization by email"
    );

    Ok(UserView::from(updated).with_organization_name(Some(organization.name)))
}

/// Removes a member from the caller's own organization (organization scope)
///
/// Runs the full guard chain: the target must be inside the caller's
/// organization, must not be the caller, and must not be a peer
/// organization admin.
///
/// # Errors
///
/// Returns the guard violation or store failure
pub async fn remove_scoped(
    pool: &PgPool,
    operator_id: Uuid,
    caller_organization: Uuid,
    user_id: Uuid,
) -> Result<UserView, MembershipError> {
    let user = User::find_by_id(pool, user_id)
        .await?
        .ok_or(MembershipError::UserNotFound)?;

    authorize_command(
        AdminCapability::Organization(caller_organization),
        operator_id,
        AdminCommand::RemoveFromOrganization,
        &TargetUser::from(&user),
    )?;

    let updated = User::set_organization(pool, user_id, None)
        .await?
        .ok_or(MembershipError::UserNotFound)?;

    tracing::info!(
        user_id = %user_id,
        organization_id = %caller_organization,
        "Member removed from organization"
    );

    Ok(UserView::from(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn target(role: UserRole, organization_id: Option<Uuid>) -> TargetUser {
        TargetUser {
            id: Uuid::new_v4(),
            role,
            organization_id,
        }
    }

    #[test]
    fn test_assignment_rejects_redundant_organization() {
        let org_id = Uuid::new_v4();
        let already = target(UserRole::User, Some(org_id));

        assert!(matches!(
            check_assignment(&already, org_id),
            Err(MembershipError::AlreadyAssigned)
        ));

        // Moving between organizations through the identity path is fine.
        let elsewhere = target(UserRole::User, Some(Uuid::new_v4()));
        assert!(check_assignment(&elsewhere, org_id).is_ok());
        assert!(check_assignment(&target(UserRole::User, None), org_id).is_ok());
    }

    #[test]
    fn test_removal_requires_an_organization() {
        assert!(matches!(
            check_removal(&target(UserRole::User, None)),
            Err(MembershipError::NoOrganization)
        ));
        assert!(check_removal(&target(UserRole::User, Some(Uuid::new_v4()))).is_ok());
    }

    #[test]
    fn test_add_by_email_distinguishes_same_and_other_organization() {
        let caller_org = Uuid::new_v4();

        let in_mine = target(UserRole::User, Some(caller_org));
        assert!(matches!(
            check_add_by_email(&in_mine, caller_org),
            Err(MembershipError::AlreadyInYourOrganization)
        ));

        let in_other = target(UserRole::User, Some(Uuid::new_v4()));
        assert!(matches!(
            check_add_by_email(&in_other, caller_org),
            Err(MembershipError::MemberOfOtherOrganization)
        ));

        let unassigned = target(UserRole::User, None);
        assert!(check_add_by_email(&unassigned, caller_org).is_ok());
    }

    #[test]
    fn test_every_path_rejects_protected_administrators() {
        let org_id = Uuid::new_v4();
        let admin = target(UserRole::Admin, None);

        assert!(matches!(
            check_assignment(&admin, org_id),
            Err(MembershipError::Guard(GuardError::ProtectedAdministrator))
        ));
        assert!(matches!(
            check_removal(&admin),
            Err(MembershipError::Guard(GuardError::ProtectedAdministrator))
        ));
        assert!(matches!(
            check_add_by_email(&admin, org_id),
            Err(MembershipError::Guard(GuardError::ProtectedAdministrator))
        ));
    }

    #[test]
    fn test_add_by_email_can_attach_org_admin_target() {
        // Only the top-level administrator role is protected; an
        // unassigned ORG_ADMIN can be brought into an organization.
        let caller_org = Uuid::new_v4();
        let org_admin = target(UserRole::OrgAdmin, None);
        assert!(check_add_by_email(&org_admin, caller_org).is_ok());
    }
}

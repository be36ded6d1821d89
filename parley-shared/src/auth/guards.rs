/// Admin command guards and the capability set
///
/// Every mutation command is checked against an ordered chain of guards
/// before any write happens:
///
/// 1. Self-modification: an operator may not target its own account
///    (status, role, update, delete, and org removal only)
/// 2. Privilege immutability: top-level administrators are immutable
///    through every command in the family
/// 3. Org boundary (organization scope only): the target must belong to
///    the caller's organization
/// 4. Scope restriction: organization scope may not ban/unban or change
///    roles at all
///
/// Guards are pure predicates over the operator, the command, and a
/// snapshot of the target row, re-read on every request. The capability is
/// resolved once at request entry ([`AdminActor`]) and handlers dispatch on
/// it; nothing deeper in the call chain re-inspects credentials.

use uuid::Uuid;

use crate::models::user::{User, UserRole};

/// The mutation command family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// Ban or unban a user
    SetBanStatus,

    /// Replace a user's password
    ResetPassword,

    /// Change a user's role
    ChangeRole,

    /// Generic update (name, membership expiration)
    Update,

    /// Delete a user and cascade over dependent resources
    Delete,

    /// Attach a user to an organization
    AssignOrganization,

    /// Detach a user from an organization
    RemoveFromOrganization,
}

impl AdminCommand {
    /// Whether the self-modification guard applies to this command
    ///
    /// Listing and read paths are exempt by construction; password reset
    /// and assignment are exempt by policy.
    pub fn is_self_guarded(&self) -> bool {
        matches!(
            self,
            AdminCommand::SetBanStatus
                | AdminCommand::ChangeRole
                | AdminCommand::Update
                | AdminCommand::Delete
                | AdminCommand::RemoveFromOrganization
        )
    }
}

/// The closed capability set for admin callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCapability {
    /// Global administrator: spans every user and organization
    Global,

    /// Organization administrator: bound to a single organization
    Organization(Uuid),
}

/// Operator identity plus its resolved capability
///
/// Built exactly once per request by the dispatch layer, from the caller's
/// freshly loaded user row, and injected into the request. Handlers branch
/// on this instead of re-checking roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminActor {
    /// A global administrator
    Global {
        /// Operator's user ID
        user_id: Uuid,
    },

    /// An organization administrator
    Organization {
        /// Operator's user ID
        user_id: Uuid,

        /// The operator's own organization
        organization_id: Uuid,
    },
}

impl AdminActor {
    /// The operator's user ID
    pub fn user_id(&self) -> Uuid {
        match self {
            AdminActor::Global { user_id } => *user_id,
            AdminActor::Organization { user_id, .. } => *user_id,
        }
    }

    /// The operator's capability
    pub fn capability(&self) -> AdminCapability {
        match self {
            AdminActor::Global { .. } => AdminCapability::Global,
            AdminActor::Organization {
                organization_id, ..
            } => AdminCapability::Organization(*organization_id),
        }
    }

    /// The operator's organization, when organization-scoped
    pub fn organization_id(&self) -> Option<Uuid> {
        match self {
            AdminActor::Global { .. } => None,
            AdminActor::Organization {
                organization_id, ..
            } => Some(*organization_id),
        }
    }

    /// The directory scope this operator queries under
    pub fn directory_scope(&self) -> crate::directory::DirectoryScope {
        match self {
            AdminActor::Global { .. } => crate::directory::DirectoryScope::Global,
            AdminActor::Organization {
                organization_id, ..
            } => crate::directory::DirectoryScope::Organization(*organization_id),
        }
    }

    /// Runs the guard chain for a command against a target
    ///
    /// # Errors
    ///
    /// Returns the first guard violation in chain order
    pub fn authorize(&self, command: AdminCommand, target: &TargetUser) -> Result<(), GuardError> {
        authorize_command(self.capability(), self.user_id(), command, target)
    }
}

/// Snapshot of the target row the guards evaluate against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetUser {
    /// Target's user ID
    pub id: Uuid,

    /// Target's current role
    pub role: UserRole,

    /// Target's current organization
    pub organization_id: Option<Uuid>,
}

impl From<&User> for TargetUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            organization_id: user.organization_id,
        }
    }
}

/// A guard violation
///
/// Each variant maps to an authorization failure (HTTP 403); the messages
/// are the fixed operator-facing strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    /// Operator targeted its own account
    #[error("You cannot perform this action on your own account")]
    SelfTarget,

    /// Target holds the top-level administrator role
    #[error("Administrator accounts cannot be modified")]
    ProtectedAdministrator,

    /// Target is outside the operator's organization
    #[error("User does not belong to your organization")]
    OutsideOrganization,

    /// Command is not available to organization administrators
    #[error("Organization admins cannot ban users or change roles; set a membership expiration instead")]
    ScopeRestricted,

    /// Organization admins cannot remove each other
    #[error("Organization admins cannot remove another organization admin")]
    PeerAdmin,
}

/// Evaluates the ordered guard chain
///
/// Violations short-circuit: the first failing guard decides the error,
/// so e.g. a self-targeted ban by an org admin reports the self guard,
/// not the scope restriction.
pub fn authorize_command(
    capability: AdminCapability,
    operator_id: Uuid,
    command: AdminCommand,
    target: &TargetUser,
) -> Result<(), GuardError> {
    if command.is_self_guarded() && operator_id == target.id {
        return Err(GuardError::SelfTarget);
    }

    if target.role.is_admin() {
        return Err(GuardError::ProtectedAdministrator);
    }

    if let AdminCapability::Organization(organization_id) = capability {
        if target.organization_id != Some(organization_id) {
            return Err(GuardError::OutsideOrganization);
        }

        if matches!(command, AdminCommand::SetBanStatus | AdminCommand::ChangeRole) {
            return Err(GuardError::ScopeRestricted);
        }

        if command == AdminCommand::RemoveFromOrganization && target.role == UserRole::OrgAdmin {
            return Err(GuardError::PeerAdmin);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(role: UserRole, organization_id: Option<Uuid>) -> TargetUser {
        TargetUser {
            id: Uuid::new_v4(),
            role,
            organization_id,
        }
    }

    #[test]
    fn test_self_guard_rejects_status_role_delete_update() {
        let operator_id = Uuid::new_v4();
        let this = TargetUser {
            id: operator_id,
            role: UserRole::OrgAdmin,
            organization_id: None,
        };

        for command in [
            AdminCommand::SetBanStatus,
            AdminCommand::ChangeRole,
            AdminCommand::Update,
            AdminCommand::Delete,
        ] {
            assert_eq!(
                authorize_command(AdminCapability::Global, operator_id, command, &this),
                Err(GuardError::SelfTarget),
                "{command:?} should be self-guarded"
            );
        }
    }

    #[test]
    fn test_reset_password_is_not_self_guarded() {
        let operator_id = Uuid::new_v4();
        let this = TargetUser {
            id: operator_id,
            role: UserRole::User,
            organization_id: None,
        };

        assert!(authorize_command(
            AdminCapability::Global,
            operator_id,
            AdminCommand::ResetPassword,
            &this
        )
        .is_ok());
    }

    #[test]
    fn test_admins_are_immutable_in_both_scopes() {
        let org_id = Uuid::new_v4();
        let admin = target(UserRole::Admin, Some(org_id));

        for command in [
            AdminCommand::SetBanStatus,
            AdminCommand::ResetPassword,
            AdminCommand::ChangeRole,
            AdminCommand::Update,
            AdminCommand::Delete,
            AdminCommand::AssignOrganization,
            AdminCommand::RemoveFromOrganization,
        ] {
            assert_eq!(
                authorize_command(AdminCapability::Global, Uuid::new_v4(), command, &admin),
                Err(GuardError::ProtectedAdministrator),
            );
            assert_eq!(
                authorize_command(
                    AdminCapability::Organization(org_id),
                    Uuid::new_v4(),
                    command,
                    &admin
                ),
                Err(GuardError::ProtectedAdministrator),
            );
        }
    }

    #[test]
    fn test_self_guard_wins_over_privilege_guard() {
        // Ordering matters: an operator targeting itself sees the self
        // guard even when other guards would also fire.
        let operator_id = Uuid::new_v4();
        let this = TargetUser {
            id: operator_id,
            role: UserRole::Admin,
            organization_id: None,
        };

        assert_eq!(
            authorize_command(
                AdminCapability::Global,
                operator_id,
                AdminCommand::Delete,
                &this
            ),
            Err(GuardError::SelfTarget),
        );
    }

    #[test]
    fn test_org_boundary_rejects_cross_organization_targets() {
        let org_id = Uuid::new_v4();
        let other_org = target(UserRole::User, Some(Uuid::new_v4()));
        let unassigned = target(UserRole::User, None);

        for bad in [other_org, unassigned] {
            assert_eq!(
                authorize_command(
                    AdminCapability::Organization(org_id),
                    Uuid::new_v4(),
                    AdminCommand::Update,
                    &bad
                ),
                Err(GuardError::OutsideOrganization),
            );
        }
    }

    #[test]
    fn test_org_scope_cannot_ban_or_change_roles() {
        let org_id = Uuid::new_v4();
        let member = target(UserRole::User, Some(org_id));

        assert_eq!(
            authorize_command(
                AdminCapability::Organization(org_id),
                Uuid::new_v4(),
                AdminCommand::SetBanStatus,
                &member
            ),
            Err(GuardError::ScopeRestricted),
        );
        assert_eq!(
            authorize_command(
                AdminCapability::Organization(org_id),
                Uuid::new_v4(),
                AdminCommand::ChangeRole,
                &member
            ),
            Err(GuardError::ScopeRestricted),
        );
    }

    #[test]
    fn test_org_scope_allows_update_delete_reset_within_org() {
        let org_id = Uuid::new_v4();
        let member = target(UserRole::User, Some(org_id));

        for command in [
            AdminCommand::Update,
            AdminCommand::Delete,
            AdminCommand::ResetPassword,
            AdminCommand::RemoveFromOrganization,
        ] {
            assert!(authorize_command(
                AdminCapability::Organization(org_id),
                Uuid::new_v4(),
                command,
                &member
            )
            .is_ok());
        }
    }

    #[test]
    fn test_peer_org_admins_cannot_remove_each_other() {
        let org_id = Uuid::new_v4();
        let peer = target(UserRole::OrgAdmin, Some(org_id));

        assert_eq!(
            authorize_command(
                AdminCapability::Organization(org_id),
                Uuid::new_v4(),
                AdminCommand::RemoveFromOrganization,
                &peer
            ),
            Err(GuardError::PeerAdmin),
        );

        // Global scope can remove an org admin from its organization.
        assert!(authorize_command(
            AdminCapability::Global,
            Uuid::new_v4(),
            AdminCommand::RemoveFromOrganization,
            &peer
        )
        .is_ok());
    }

    #[test]
    fn test_global_scope_can_ban_and_change_roles() {
        let member = target(UserRole::User, Some(Uuid::new_v4()));

        assert!(authorize_command(
            AdminCapability::Global,
            Uuid::new_v4(),
            AdminCommand::SetBanStatus,
            &member
        )
        .is_ok());
        assert!(authorize_command(
            AdminCapability::Global,
            Uuid::new_v4(),
            AdminCommand::ChangeRole,
            &member
        )
        .is_ok());
    }

    #[test]
    fn test_actor_capability_and_scope() {
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();

        let global = AdminActor::Global { user_id };
        assert_eq!(global.capability(), AdminCapability::Global);
        assert_eq!(global.organization_id(), None);

        let org = AdminActor::Organization {
            user_id,
            organization_id: org_id,
        };
        assert_eq!(org.capability(), AdminCapability::Organization(org_id));
        assert_eq!(org.organization_id(), Some(org_id));
        assert_eq!(
            org.directory_scope(),
            crate::directory::DirectoryScope::Organization(org_id)
        );
    }
}

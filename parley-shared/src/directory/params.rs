/// List-request parameters and filter parsing
///
/// Everything the directory planner accepts is optional and forgiving:
/// pagination values are clamped rather than rejected, and malformed role,
/// status, or organization filters degrade to "no filter" instead of
/// erroring. Only the caller's scope (decided by the dispatch layer) is
/// mandatory.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Smallest accepted page size
pub const MIN_PAGE_SIZE: i64 = 1;

/// Largest accepted page size
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size used when the request doesn't name one
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Window for the `expiring_soon` status filter, in days
pub const EXPIRY_WINDOW_DAYS: i64 = 7;

/// Sentinel organization filter meaning "no organization assigned"
pub const UNASSIGNED_SENTINEL: &str = "none";

/// Raw query parameters of `GET /users`
///
/// Deserialized straight from the query string; accessors apply clamping
/// and defaulting so handlers never see out-of-range values. Serializes
/// back to the same shape, which is what the console client sends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersParams {
    /// Page number, floored to 1
    pub page: Option<i64>,

    /// Page size, clamped into [1, 100]
    pub limit: Option<i64>,

    /// Free-text search over email, username, and display name
    pub search: Option<String>,

    /// Role filter; ignored unless it parses as a known role
    pub role: Option<String>,

    /// Status filter; semantics differ by scope
    pub status: Option<String>,

    /// Organization filter (global scope only): an ID or "none"
    pub organization: Option<String>,

    /// Sort field
    pub sort_by: Option<String>,

    /// Sort order ("asc" / "desc")
    pub sort_order: Option<String>,
}

impl ListUsersParams {
    /// Effective page number (≥ 1)
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Effective page size, clamped into [1, 100]
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Row offset for the effective page
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }

    /// Search term, if present and non-empty after trimming
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Role filter, if it names a known role
    pub fn role_filter(&self) -> Option<UserRole> {
        self.role.as_deref().and_then(UserRole::from_str)
    }

    /// Sort field, defaulting to creation time on anything unrecognized
    pub fn sort_field(&self) -> SortField {
        SortField::from_param(self.sort_by.as_deref())
    }

    /// Sort order, defaulting to descending
    pub fn sort_direction(&self) -> SortOrder {
        SortOrder::from_param(self.sort_order.as_deref())
    }
}

/// The fixed set of sortable fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Account creation time (the default)
    CreatedAt,
    /// Display name
    Name,
    /// Email address
    Email,
    /// Membership expiration
    MembershipExpiresAt,
    /// Last login
    LastLoginAt,
    /// Role
    Role,
}

impl SortField {
    /// Parses a sort field, falling back to creation time
    ///
    /// An absent or unrecognized field is not an error; the directory
    /// defaults to "creation time, descending".
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("createdAt") => SortField::CreatedAt,
            Some("name") => SortField::Name,
            Some("email") => SortField::Email,
            Some("membershipExpiresAt") => SortField::MembershipExpiresAt,
            Some("lastLoginAt") => SortField::LastLoginAt,
            Some("role") => SortField::Role,
            _ => SortField::CreatedAt,
        }
    }

    /// Column this field sorts on
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Name => "name",
            SortField::Email => "email",
            SortField::MembershipExpiresAt => "membership_expires_at",
            SortField::LastLoginAt => "last_login_at",
            SortField::Role => "role",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending (the default)
    Desc,
}

impl SortOrder {
    /// Parses a sort order, falling back to descending
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    /// SQL keyword for this order
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Status filter values visible in global scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalStatus {
    /// Banned flag set
    Banned,
    /// Banned flag not set
    Active,
    /// Membership expiration in the past
    Expired,
    /// Membership expiration within the next 7 days
    ExpiringSoon,
}

impl GlobalStatus {
    /// Parses a global status filter; unknown values mean "no filter"
    pub fn from_param(param: Option<&str>) -> Option<Self> {
        match param {
            Some("banned") => Some(GlobalStatus::Banned),
            Some("active") => Some(GlobalStatus::Active),
            Some("expired") => Some(GlobalStatus::Expired),
            Some("expiring_soon") => Some(GlobalStatus::ExpiringSoon),
            _ => None,
        }
    }
}

/// Status filter values visible in organization scope
///
/// Ban status is not exposed in this scope; org admins reason about
/// membership expiration only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgStatus {
    /// No expiration, or expiration in the future
    Active,
    /// Expiration in the past
    Expired,
}

impl OrgStatus {
    /// Parses an organization-scope status filter; unknown means "no filter"
    pub fn from_param(param: Option<&str>) -> Option<Self> {
        match param {
            Some("active") => Some(OrgStatus::Active),
            Some("expired") => Some(OrgStatus::Expired),
            _ => None,
        }
    }
}

/// Organization filter, global scope only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationFilter {
    /// Users with no organization assigned
    Unassigned,
    /// Users in one specific organization
    Id(Uuid),
}

impl OrganizationFilter {
    /// Parses the organization filter; malformed IDs mean "no filter"
    pub fn from_param(param: Option<&str>) -> Option<Self> {
        match param {
            Some(UNASSIGNED_SENTINEL) => Some(OrganizationFilter::Unassigned),
            Some(raw) => Uuid::parse_str(raw).ok().map(OrganizationFilter::Id),
            None => None,
        }
    }
}

/// Escapes LIKE metacharacters in a search term
///
/// The search string is matched as a literal substring, so `%`, `_`, and
/// the escape character itself must not act as wildcards.
pub fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_clamped_not_rejected() {
        let params = ListUsersParams {
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(params.limit(), 100);

        let params = ListUsersParams {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(params.limit(), 1);

        let params = ListUsersParams {
            limit: Some(-5),
            ..Default::default()
        };
        assert_eq!(params.limit(), 1);
    }

    #[test]
    fn test_limit_defaults() {
        let params = ListUsersParams::default();
        assert_eq!(params.limit(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_page_floored_to_one() {
        let params = ListUsersParams {
            page: Some(0),
            ..Default::default()
        };
        assert_eq!(params.page(), 1);

        let params = ListUsersParams {
            page: Some(-3),
            ..Default::default()
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_offset_from_page_and_limit() {
        let params = ListUsersParams {
            page: Some(3),
            limit: Some(25),
            ..Default::default()
        };
        assert_eq!(params.offset(), 50);
    }

    #[test]
    fn test_search_term_trims_and_drops_empty() {
        let params = ListUsersParams {
            search: Some("  jordan  ".to_string()),
            ..Default::default()
        };
        assert_eq!(params.search_term(), Some("jordan"));

        let params = ListUsersParams {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(params.search_term(), None);
    }

    #[test]
    fn test_unknown_role_filter_is_ignored() {
        let params = ListUsersParams {
            role: Some("ROOT".to_string()),
            ..Default::default()
        };
        assert_eq!(params.role_filter(), None);

        let params = ListUsersParams {
            role: Some("ORG_ADMIN".to_string()),
            ..Default::default()
        };
        assert_eq!(params.role_filter(), Some(UserRole::OrgAdmin));
    }

    #[test]
    fn test_sort_defaults_to_created_at_desc() {
        assert_eq!(SortField::from_param(None), SortField::CreatedAt);
        assert_eq!(SortField::from_param(Some("shoe_size")), SortField::CreatedAt);
        assert_eq!(SortOrder::from_param(None), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(Some("upside_down")), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(Some("asc")), SortOrder::Asc);
    }

    #[test]
    fn test_sort_field_columns() {
        assert_eq!(SortField::from_param(Some("email")).column(), "email");
        assert_eq!(
            SortField::from_param(Some("membershipExpiresAt")).column(),
            "membership_expires_at"
        );
        assert_eq!(SortField::from_param(Some("lastLoginAt")).column(), "last_login_at");
    }

    #[test]
    fn test_global_status_parsing() {
        assert_eq!(GlobalStatus::from_param(Some("banned")), Some(GlobalStatus::Banned));
        assert_eq!(
            GlobalStatus::from_param(Some("expiring_soon")),
            Some(GlobalStatus::ExpiringSoon)
        );
        assert_eq!(GlobalStatus::from_param(Some("frozen")), None);
        assert_eq!(GlobalStatus::from_param(None), None);
    }

    #[test]
    fn test_org_status_does_not_expose_banned() {
        assert_eq!(OrgStatus::from_param(Some("banned")), None);
        assert_eq!(OrgStatus::from_param(Some("active")), Some(OrgStatus::Active));
        assert_eq!(OrgStatus::from_param(Some("expired")), Some(OrgStatus::Expired));
    }

    #[test]
    fn test_organization_filter_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(
            OrganizationFilter::from_param(Some(&id.to_string())),
            Some(OrganizationFilter::Id(id))
        );
        assert_eq!(
            OrganizationFilter::from_param(Some("none")),
            Some(OrganizationFilter::Unassigned)
        );
        assert_eq!(OrganizationFilter::from_param(Some("not-a-uuid")), None);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}

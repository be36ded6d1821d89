/// Role-scoped directory query planner
///
/// Translates list-request parameters into a scoped, filtered, sorted,
/// paginated result plus an accurate total count. The same predicate backs
/// both the page SELECT and the COUNT, so the total can never drift from
/// the rows it describes.
///
/// Predicate assembly is a pure function over the scope, the parameters,
/// and a caller-supplied clock; execution applies the accumulated bind
/// arguments in order. The planner performs no authorization — the
/// dispatch layer decides the scope before it is ever called.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::organization::Organization;
use crate::models::user::{User, UserRole, UserView};

use super::params::{
    escape_like, GlobalStatus, ListUsersParams, OrgStatus, OrganizationFilter,
    EXPIRY_WINDOW_DAYS,
};

/// Authority scope of a directory query
///
/// Decided once at request entry from the caller's role; the planner never
/// inspects credentials itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryScope {
    /// Global administrator: the whole user base
    Global,

    /// Organization administrator: pinned to one organization
    Organization(Uuid),
}

/// A single positional bind argument accumulated by the predicate builder
#[derive(Debug, Clone, PartialEq)]
pub enum BindArg {
    /// Text value (search patterns)
    Text(String),

    /// UUID value (organization references)
    Uuid(Uuid),

    /// Timestamp value (expiration comparisons)
    Timestamp(DateTime<Utc>),

    /// Role value (role filter)
    Role(UserRole),
}

/// WHERE clause plus its ordered bind arguments
#[derive(Debug, Clone)]
pub struct UserPredicate {
    /// SQL boolean expression with `$1`-style placeholders
    pub clause: String,

    /// Arguments in placeholder order
    pub args: Vec<BindArg>,
}

/// Pagination metadata returned with every page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Effective page number
    pub page: i64,

    /// Effective page size
    pub limit: i64,

    /// Whether a later page exists
    pub has_next_page: bool,

    /// Whether an earlier page exists
    pub has_prev_page: bool,
}

/// One page of directory results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryPage {
    /// Credential-stripped user projections
    pub users: Vec<UserView>,

    /// Total rows matching the same predicate as this page
    pub total_users: i64,

    /// Page count at the effective page size
    pub total_pages: i64,

    /// Page/limit echo with navigation flags
    pub pagination: PaginationMeta,
}

/// Builds the WHERE predicate for a scoped list request
///
/// Pure: the clock is a parameter so filter combinations can be asserted
/// without a database. Malformed role/status/organization values contribute
/// nothing to the predicate.
pub fn build_predicate(
    scope: &DirectoryScope,
    params: &ListUsersParams,
    now: DateTime<Utc>,
) -> UserPredicate {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<BindArg> = Vec::new();

    if let DirectoryScope::Organization(org_id) = scope {
        args.push(BindArg::Uuid(*org_id));
        clauses.push(format!("organization_id = ${}", args.len()));
        // Top-level administrators are invisible to organization scope.
        clauses.push("role <> 'ADMIN'".to_string());
    }

    if let Some(term) = params.search_term() {
        args.push(BindArg::Text(format!("%{}%", escape_like(term))));
        let n = args.len();
        clauses.push(format!(
            "(email ILIKE ${n} OR username ILIKE ${n} OR name ILIKE ${n})"
        ));
    }

    if let Some(role) = params.role_filter() {
        args.push(BindArg::Role(role));
        clauses.push(format!("role = ${}", args.len()));
    }

    match scope {
        DirectoryScope::Global => {
            match OrganizationFilter::from_param(params.organization.as_deref()) {
                Some(OrganizationFilter::Unassigned) => {
                    clauses.push("organization_id IS NULL".to_string());
                }
                Some(OrganizationFilter::Id(id)) => {
                    args.push(BindArg::Uuid(id));
                    clauses.push(format!("organization_id = ${}", args.len()));
                }
                None => {}
            }

            match GlobalStatus::from_param(params.status.as_deref()) {
                Some(GlobalStatus::Banned) => clauses.push("banned = TRUE".to_string()),
                Some(GlobalStatus::Active) => clauses.push("banned IS NOT TRUE".to_string()),
                Some(GlobalStatus::Expired) => {
                    args.push(BindArg::Timestamp(now));
                    clauses.push(format!(
                        "membership_expires_at IS NOT NULL AND membership_expires_at < ${}",
                        args.len()
                    ));
                }
                Some(GlobalStatus::ExpiringSoon) => {
                    args.push(BindArg::Timestamp(now));
                    let from = args.len();
                    args.push(BindArg::Timestamp(now + Duration::days(EXPIRY_WINDOW_DAYS)));
                    let to = args.len();
                    clauses.push(format!(
                        "membership_expires_at >= ${from} AND membership_expires_at < ${to}"
                    ));
                }
                None => {}
            }
        }
        DirectoryScope::Organization(_) => {
            match OrgStatus::from_param(params.status.as_deref()) {
                Some(OrgStatus::Active) => {
                    args.push(BindArg::Timestamp(now));
                    clauses.push(format!(
                        "(membership_expires_at IS NULL OR membership_expires_at >= ${})",
                        args.len()
                    ));
                }
                Some(OrgStatus::Expired) => {
                    args.push(BindArg::Timestamp(now));
                    clauses.push(format!(
                        "membership_expires_at IS NOT NULL AND membership_expires_at < ${}",
                        args.len()
                    ));
                }
                None => {}
            }
        }
    }

    let clause = if clauses.is_empty() {
        "TRUE".to_string()
    } else {
        clauses.join(" AND ")
    };

    UserPredicate { clause, args }
}

/// Builds the COUNT and page SELECT statements for a list request
///
/// Both statements share one predicate. The SELECT appends `LIMIT`/`OFFSET`
/// placeholders after the predicate's arguments; the executor binds the
/// clamped values in that order.
pub fn build_list_queries(
    scope: &DirectoryScope,
    params: &ListUsersParams,
    now: DateTime<Utc>,
) -> (String, String, Vec<BindArg>) {
    let predicate = build_predicate(scope, params, now);

    let count_sql = format!("SELECT COUNT(*) FROM users WHERE {}", predicate.clause);

    let select_sql = format!(
        "SELECT id, email, username, name, password_hash, role, banned, \
         two_factor_secret, backup_codes, membership_expires_at, organization_id, \
         created_at, updated_at, last_login_at \
         FROM users WHERE {} ORDER BY {} {} LIMIT ${} OFFSET ${}",
        predicate.clause,
        params.sort_field().column(),
        params.sort_direction().keyword(),
        predicate.args.len() + 1,
        predicate.args.len() + 2,
    );

    (count_sql, select_sql, predicate.args)
}

/// Executes a scoped list request
///
/// Runs the count and the page query against the same predicate, strips
/// every row down to [`UserView`], and — in global scope — enriches the
/// page with organization display names through one bulk lookup keyed by
/// the distinct organization IDs on the current page only.
///
/// # Errors
///
/// Returns an error if database connection fails
pub async fn list_users(
    pool: &PgPool,
    scope: &DirectoryScope,
    params: &ListUsersParams,
) -> Result<DirectoryPage, sqlx::Error> {
    let (count_sql, select_sql, args) = build_list_queries(scope, params, Utc::now());

    // Total is recomputed per request against the live predicate; it is
    // never cached, so it cannot desynchronize from the page.
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_query = match arg {
            BindArg::Text(v) => count_query.bind(v.clone()),
            BindArg::Uuid(v) => count_query.bind(*v),
            BindArg::Timestamp(v) => count_query.bind(*v),
            BindArg::Role(v) => count_query.bind(*v),
        };
    }
    let total_users = count_query.fetch_one(pool).await?;

    let page = params.page();
    let limit = params.limit();

    let mut select_query = sqlx::query_as::<_, User>(&select_sql);
    for arg in &args {
        select_query = match arg {
            BindArg::Text(v) => select_query.bind(v.clone()),
            BindArg::Uuid(v) => select_query.bind(*v),
            BindArg::Timestamp(v) => select_query.bind(*v),
            BindArg::Role(v) => select_query.bind(*v),
        };
    }
    let rows = select_query
        .bind(limit)
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    let mut users: Vec<UserView> = rows.into_iter().map(UserView::from).collect();

    if matches!(*scope, DirectoryScope::Global) {
        let mut org_ids: Vec<Uuid> = users.iter().filter_map(|u| u.organization_id).collect();
        org_ids.sort();
        org_ids.dedup();

        if !org_ids.is_empty() {
            let names = Organization::names_by_ids(pool, &org_ids).await?;
            for user in &mut users {
                if let Some(org_id) = user.organization_id {
                    user.organization_name = names.get(&org_id).cloned();
                }
            }
        }
    }

    let total_pages = if total_users == 0 {
        0
    } else {
        (total_users + limit - 1) / limit
    };

    Ok(DirectoryPage {
        users,
        total_users,
        total_pages,
        pagination: PaginationMeta {
            page,
            limit,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        },
    })
}

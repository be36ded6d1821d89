/// User model and database operations
///
/// This module provides the User model and CRUD operations for the Parley
/// directory. A user belongs to at most one organization at a time via the
/// nullable `organization_id` reference.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('USER', 'ADMIN', 'ORG_ADMIN');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     username VARCHAR(80),
///     name VARCHAR(255),
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'USER',
///     banned BOOLEAN NOT NULL DEFAULT FALSE,
///     two_factor_secret VARCHAR(255),
///     backup_codes TEXT[],
///     membership_expires_at TIMESTAMPTZ,
///     organization_id UUID REFERENCES organizations(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Projections
///
/// Raw `User` rows never cross the API boundary. Every response uses
/// [`UserView`], which strips the password hash, two-factor secret, and
/// backup codes unconditionally and derives the `enabled` flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Operator and member roles
///
/// `Admin` is the global administrator; `OrgAdmin` is scoped to a single
/// organization. Stored as the Postgres enum `user_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Regular chat user
    User,

    /// Global administrator, spans all organizations
    Admin,

    /// Organization-scoped administrator
    OrgAdmin,
}

impl UserRole {
    /// Converts role to its wire/storage string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
            UserRole::OrgAdmin => "ORG_ADMIN",
        }
    }

    /// Parses a role from its wire string
    ///
    /// Returns `None` for anything that is not one of the known role
    /// values; callers decide whether that means "no filter" or an error.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(UserRole::User),
            "ADMIN" => Some(UserRole::Admin),
            "ORG_ADMIN" => Some(UserRole::OrgAdmin),
            _ => None,
        }
    }

    /// Whether this role is the top-level administrator
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// User model representing a chat account
///
/// The password hash and two-factor fields stay inside this struct; it is
/// deliberately not serializable. Use [`UserView`] for anything that leaves
/// the process.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Email address (case-insensitive via CITEXT)
    pub email: String,

    /// Login handle
    pub username: Option<String>,

    /// Display name
    pub name: Option<String>,

    /// Argon2id password hash, never plaintext
    pub password_hash: String,

    /// Role within Parley
    pub role: UserRole,

    /// Whether the account is banned
    pub banned: bool,

    /// TOTP secret, if two-factor is enrolled
    pub two_factor_secret: Option<String>,

    /// Two-factor backup codes
    pub backup_codes: Option<Vec<String>>,

    /// When organization membership lapses; None means unlimited
    pub membership_expires_at: Option<DateTime<Utc>>,

    /// The single organization this user belongs to, if any
    pub organization_id: Option<Uuid>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,

    /// When the user last logged in (None if never)
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Email address, already lowercased by the caller
    pub email: String,

    /// Argon2id password hash (NOT a plaintext password)
    pub password_hash: String,

    /// Optional login handle
    pub username: Option<String>,

    /// Optional display name
    pub name: Option<String>,

    /// Role to assign
    pub role: UserRole,

    /// Organization to attach at creation, if any
    pub organization_id: Option<Uuid>,
}

/// Input for the generic update command
///
/// Only non-None fields are written. `membership_expires_at` is doubly
/// optional: `Some(None)` clears the expiration, `None` leaves it alone.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    /// New display name
    pub name: Option<String>,

    /// New membership expiration (use Some(None) to clear)
    pub membership_expires_at: Option<Option<DateTime<Utc>>>,
}

/// Credential-stripped response projection
///
/// This is the only user shape the REST surface and the admin console ever
/// see. `enabled` is the logical negation of the banned flag and
/// `last_activity` is derived from the last login timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    /// User ID
    pub id: Uuid,

    /// Email address
    pub email: String,

    /// Login handle
    #[serde(default)]
    pub username: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Role
    pub role: UserRole,

    /// Negation of the banned flag
    pub enabled: bool,

    /// Membership expiration; absent means unlimited
    #[serde(default)]
    pub membership_expires_at: Option<DateTime<Utc>>,

    /// Organization reference
    #[serde(default)]
    pub organization_id: Option<Uuid>,

    /// Display name of the referenced organization, when enriched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,

    /// Account creation time
    pub created_at: DateTime<Utc>,

    /// Last activity, derived from last login
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            name: user.name,
            role: user.role,
            enabled: !user.banned,
            membership_expires_at: user.membership_expires_at,
            organization_id: user.organization_id,
            organization_name: None,
            created_at: user.created_at,
            last_activity: user.last_login_at,
        }
    }
}

impl UserView {
    /// Attaches an organization display name to the projection
    pub fn with_organization_name(mut self, name: Option<String>) -> Self {
        self.organization_name = name;
        self
    }
}

impl User {
    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email already exists (unique constraint violation)
    /// - The referenced organization doesn't exist (foreign key violation)
    /// - Database connection fails
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use parley_shared::models::user::{User, CreateUser, UserRole};
    /// # use sqlx::PgPool;
    /// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
    /// let user = User::create(&pool, CreateUser {
    ///     email: "user@example.com".to_string(),
    ///     password_hash: "$argon2id$...".to_string(),
    ///     username: Some("user".to_string()),
    ///     name: Some("Jordan Doe".to_string()),
    ///     role: UserRole::User,
    ///     organization_id: None,
    /// }).await?;
    /// println!("Created user: {}", user.id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, username, name, role, organization_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, username, name, password_hash, role, banned,
                      two_factor_secret, backup_codes, membership_expires_at,
                      organization_id, created_at, updated_at, last_login_at
            "#,
        )
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.username)
        .bind(data.name)
        .bind(data.role)
        .bind(data.organization_id)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, name, password_hash, role, banned,
                   two_factor_secret, backup_codes, membership_expires_at,
                   organization_id, created_at, updated_at, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address
    ///
    /// Lookup is case-insensitive (CITEXT column type).
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, name, password_hash, role, banned,
                   two_factor_secret, backup_codes, membership_expires_at,
                   organization_id, created_at, updated_at, last_login_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Applies the generic update command (name and/or membership expiration)
    ///
    /// Only fields present in `data` are written. The `updated_at` timestamp
    /// is always refreshed.
    ///
    /// # Returns
    ///
    /// The updated user if found, None if the user doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build dynamic update query based on which fields are present
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.membership_expires_at.is_some() {
            bind_count += 1;
            query.push_str(&format!(", membership_expires_at = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, email, username, name, password_hash, role, banned, \
             two_factor_secret, backup_codes, membership_expires_at, organization_id, \
             created_at, updated_at, last_login_at",
        );

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(expires_at) = data.membership_expires_at {
            q = q.bind(expires_at);
        }

        let user = q.fetch_optional(pool).await?;

        Ok(user)
    }

    /// Sets the banned flag
    ///
    /// Session invalidation for newly banned users is the caller's
    /// responsibility (see the status command handler).
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn set_banned(
        pool: &PgPool,
        id: Uuid,
        banned: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET banned = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, username, name, password_hash, role, banned,
                      two_factor_secret, backup_codes, membership_expires_at,
                      organization_id, created_at, updated_at, last_login_at
            "#,
        )
        .bind(id)
        .bind(banned)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Replaces the stored password hash
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn set_password_hash(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, username, name, password_hash, role, banned,
                      two_factor_secret, backup_codes, membership_expires_at,
                      organization_id, created_at, updated_at, last_login_at
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Changes the user's role
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn set_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, username, name, password_hash, role, banned,
                      two_factor_secret, backup_codes, membership_expires_at,
                      organization_id, created_at, updated_at, last_login_at
            "#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Sets or clears the organization reference
    ///
    /// The single-organization invariant lives in the membership
    /// coordinator; this is the raw write it drives.
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn set_organization(
        pool: &PgPool,
        id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET organization_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, username, name, password_hash, role, banned,
                      two_factor_secret, backup_codes, membership_expires_at,
                      organization_id, created_at, updated_at, last_login_at
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Deletes a user by ID
    ///
    /// Terminal: dependent-resource cleanup must have settled before this
    /// is called (see `cleanup::purge_user_data`).
    ///
    /// # Returns
    ///
    /// True if a row was deleted, false if the user didn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "jordan@example.com".to_string(),
            username: Some("jordan".to_string()),
            name: Some("Jordan Doe".to_string()),
            password_hash: "$argon2id$secret".to_string(),
            role: UserRole::User,
            banned: false,
            two_factor_secret: Some("JBSWY3DP".to_string()),
            backup_codes: Some(vec!["code-1".to_string()]),
            membership_expires_at: None,
            organization_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::User, UserRole::Admin, UserRole::OrgAdmin] {
            assert_eq!(UserRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::from_str("superadmin"), None);
        assert_eq!(UserRole::from_str("admin"), None); // case-sensitive
    }

    #[test]
    fn test_role_serde_wire_format() {
        let json = serde_json::to_string(&UserRole::OrgAdmin).unwrap();
        assert_eq!(json, "\"ORG_ADMIN\"");
        let role: UserRole = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }

    #[test]
    fn test_view_strips_credentials() {
        let user = sample_user();
        let view = UserView::from(user);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(json.get("twoFactorSecret").is_none());
        assert!(json.get("backupCodes").is_none());
    }

    #[test]
    fn test_view_derives_enabled_from_banned() {
        let mut user = sample_user();
        user.banned = true;
        assert!(!UserView::from(user.clone()).enabled);

        user.banned = false;
        assert!(UserView::from(user).enabled);
    }

    #[test]
    fn test_view_last_activity_from_last_login() {
        let mut user = sample_user();
        let login = user.last_login_at;
        assert_eq!(UserView::from(user.clone()).last_activity, login);

        user.last_login_at = None;
        assert_eq!(UserView::from(user).last_activity, None);
    }

    #[test]
    fn test_view_organization_name_omitted_when_absent() {
        let view = UserView::from(sample_user());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("organizationName").is_none());

        let enriched = UserView::from(sample_user())
            .with_organization_name(Some("Acme".to_string()));
        let json = serde_json::to_value(&enriched).unwrap();
        assert_eq!(json["organizationName"], "Acme");
    }

    #[test]
    fn test_view_uses_camel_case_keys() {
        let view = UserView::from(sample_user());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("membershipExpiresAt").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("lastActivity").is_some());
    }
}

/// Organization model and database operations
///
/// Organizations are the tenants of the Parley directory. A user references
/// at most one organization through `users.organization_id`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organizations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     slug VARCHAR(64) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Organization model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Unique organization ID (UUID v4)
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Short code used in invite links and the console
    pub slug: String,

    /// When the organization was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    /// Display name
    pub name: String,

    /// Short code (must be unique)
    pub slug: String,
}

impl Organization {
    /// Creates a new organization
    ///
    /// # Errors
    ///
    /// Returns an error if the slug already exists or the database
    /// connection fails
    pub async fn create(pool: &PgPool, data: CreateOrganization) -> Result<Self, sqlx::Error> {
        let organization = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name, slug)
            VALUES ($1, $2)
            RETURNING id, name, slug, created_at
            "#,
        )
        .bind(data.name)
        .bind(data.slug)
        .fetch_one(pool)
        .await?;

        Ok(organization)
    }

    /// Finds an organization by ID
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let organization = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, slug, created_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(organization)
    }

    /// Finds an organization by its short code
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        let organization = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, slug, created_at
            FROM organizations
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(pool)
        .await?;

        Ok(organization)
    }

    /// Bulk-resolves display names for a set of organization IDs
    ///
    /// Used by the directory planner to enrich one page of results with a
    /// single query; the input is the distinct IDs present on the current
    /// page, so lookup cost is bounded by page size.
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn names_by_ids(
        pool: &PgPool,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT id, name
            FROM organizations
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

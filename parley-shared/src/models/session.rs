/// Login session records
///
/// Sessions are issued by the login service and stored in the `sessions`
/// table. The directory service only ever revokes them: banning a user
/// invalidates every active session, and deletion sweeps them up with the
/// rest of the cascade.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// A single login session
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    /// Session ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Hash of the session token
    pub token_hash: String,

    /// When the session was issued
    pub created_at: DateTime<Utc>,

    /// When the session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Deletes every session belonging to a user
    ///
    /// # Returns
    ///
    /// The number of sessions revoked
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

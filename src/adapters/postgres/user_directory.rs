//! PostgreSQL implementation of UserDirectory.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::messaging::UserProfile;
use crate::ports::{DirectoryError, UserDirectory};

#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, display_name, avatar_url, last_seen, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DirectoryError::Database(format!("Failed to fetch user: {}", e)))?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, display_name, avatar_url, last_seen, is_active
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DirectoryError::Database(format!("Failed to fetch user by email: {}", e)))?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn record_last_seen(&self, id: UserId, at: Timestamp) -> Result<(), DirectoryError> {
        let result = sqlx::query("UPDATE users SET last_seen = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| DirectoryError::Database(format!("Failed to update last_seen: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DirectoryError::NotFound);
        }
        Ok(())
    }
}

fn row_to_profile(row: &PgRow) -> Result<UserProfile, DirectoryError> {
    let map = |e: sqlx::Error| DirectoryError::Database(format!("Malformed user row: {}", e));

    let id: uuid::Uuid = row.try_get("id").map_err(map)?;
    let last_seen: Option<chrono::DateTime<chrono::Utc>> = row.try_get("last_seen").map_err(map)?;

    Ok(UserProfile {
        id: UserId::from_uuid(id),
        email: row.try_get("email").map_err(map)?,
        display_name: row.try_get("display_name").map_err(map)?,
        avatar_url: row.try_get("avatar_url").map_err(map)?,
        last_seen: last_seen.map(Timestamp::from_datetime),
        is_active: row.try_get("is_active").map_err(map)?,
    })
}

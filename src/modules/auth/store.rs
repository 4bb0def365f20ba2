//! Persistence of issued session tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bookstore_db::{Database, DbError};

/// One issued token as recorded in `user_tokens`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TokenRecord {
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save(&self, record: &TokenRecord) -> Result<(), DbError>;

    /// Remove a token. Returns `false` when no record matched.
    async fn delete(&self, token: &str) -> Result<bool, DbError>;

    async fn exists(&self, token: &str) -> Result<bool, DbError>;

    /// Remove every record that expired before `now`; returns how many went.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}

pub struct PgTokenStore {
    db: Database,
}

impl PgTokenStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn save(&self, record: &TokenRecord) -> Result<(), DbError> {
        sqlx::query("INSERT INTO user_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)")
            .bind(record.user_id)
            .bind(&record.token)
            .bind(record.expires_at)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM user_tokens WHERE token = $1")
            .bind(token)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, token: &str) -> Result<bool, DbError> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_tokens WHERE token = $1)")
                .bind(token)
                .fetch_one(self.db.pool())
                .await?;
        Ok(found)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM user_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

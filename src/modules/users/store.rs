use async_trait::async_trait;

use bookstore_db::{Database, DbError};

use super::models::{User, UserCredentials};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert an account. A taken email surfaces as `DbError::UniqueViolation`.
    async fn create(&self, email: &str, password_hash: &str, is_admin: bool) -> Result<User, DbError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, DbError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DbError>;
}

pub struct PgUserStore {
    db: Database,
}

impl PgUserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, email: &str, password_hash: &str, is_admin: bool) -> Result<User, DbError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, is_admin)
            VALUES ($1, $2, $3)
            RETURNING id, email, is_admin, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(is_admin)
        .fetch_one(self.db.pool())
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, DbError> {
        let user = sqlx::query_as::<_, UserCredentials>(
            r#"
            SELECT id, email, password_hash, is_admin, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, is_admin, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user)
    }
}

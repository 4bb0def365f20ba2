use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookstore_db::{Database, DbError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn create(&self, name: &str) -> Result<Category, DbError>;
    async fn get(&self, id: i64) -> Result<Option<Category>, DbError>;
    async fn list(&self) -> Result<Vec<Category>, DbError>;
    async fn update(&self, id: i64, name: &str) -> Result<Option<Category>, DbError>;
    /// `Ok(false)` when no such category existed.
    async fn delete(&self, id: i64) -> Result<bool, DbError>;
}

pub struct PgCategoryStore {
    db: Database,
}

impl PgCategoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryStore for PgCategoryStore {
    async fn create(&self, name: &str) -> Result<Category, DbError> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, created_at, updated_at",
        )
        .bind(name)
        .fetch_one(self.db.pool())
        .await?;
        Ok(category)
    }

    async fn get(&self, id: i64) -> Result<Option<Category>, DbError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(category)
    }

    async fn list(&self) -> Result<Vec<Category>, DbError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at, updated_at FROM categories ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(categories)
    }

    async fn update(&self, id: i64, name: &str) -> Result<Option<Category>, DbError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET name = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(category)
    }

    async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Category store kept in process memory.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct InMemoryCategoryStore {
    categories: tokio::sync::Mutex<std::collections::BTreeMap<i64, Category>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl InMemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl CategoryStore for InMemoryCategoryStore {
    async fn create(&self, name: &str) -> Result<Category, DbError> {
        let mut categories = self.categories.lock().await;
        if categories.values().any(|c| c.name == name) {
            return Err(DbError::UniqueViolation("categories_name_key".to_string()));
        }
        let id = categories.keys().next_back().map_or(1, |last| last + 1);
        let now = Utc::now();
        let category = Category {
            id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        categories.insert(id, category.clone());
        Ok(category)
    }

    async fn get(&self, id: i64) -> Result<Option<Category>, DbError> {
        Ok(self.categories.lock().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Category>, DbError> {
        Ok(self.categories.lock().await.values().cloned().collect())
    }

    async fn update(&self, id: i64, name: &str) -> Result<Option<Category>, DbError> {
        let mut categories = self.categories.lock().await;
        if categories.values().any(|c| c.name == name && c.id != id) {
            return Err(DbError::UniqueViolation("categories_name_key".to_string()));
        }
        Ok(categories.get_mut(&id).map(|category| {
            category.name = name.to_string();
            category.updated_at = Utc::now();
            category.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool, DbError> {
        Ok(self.categories.lock().await.remove(&id).is_some())
    }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use bookstore_db::DbError;

use super::models::{User, UserCredentials};
use super::store::UserStore;

/// User store kept in process memory.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<BTreeMap<i64, UserCredentials>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, email: &str, password_hash: &str, is_admin: bool) -> Result<User, DbError> {
        let mut users = self.users.lock().await;
        if users.values().any(|user| user.email == email) {
            return Err(DbError::UniqueViolation("users_email_key".to_string()));
        }

        let id = users.keys().next_back().map_or(1, |last| last + 1);
        let now = Utc::now();
        let record = UserCredentials {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_admin,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, record.clone());
        Ok(record.into_user())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, DbError> {
        let users = self.users.lock().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let users = self.users.lock().await;
        Ok(users.get(&id).cloned().map(UserCredentials::into_user))
    }
}

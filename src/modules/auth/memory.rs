use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use bookstore_db::DbError;

use super::store::{TokenRecord, TokenStore};

/// Token store kept in process memory.
#[derive(Default)]
pub struct InMemoryTokenStore {
    records: Mutex<HashMap<String, TokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn save(&self, record: &TokenRecord) -> Result<(), DbError> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.token) {
            return Err(DbError::UniqueViolation("user_tokens_token_key".to_string()));
        }
        records.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<bool, DbError> {
        Ok(self.records.lock().await.remove(token).is_some())
    }

    async fn exists(&self, token: &str) -> Result<bool, DbError> {
        Ok(self.records.lock().await.contains_key(token))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.expires_at >= now);
        Ok((before - records.len()) as u64)
    }
}

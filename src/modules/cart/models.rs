use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's cart: a sorted, duplicate-free set of book ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cart {
    pub user_id: i64,
    pub book_ids: Vec<i64>,
    /// Idle clock for the sweep. `None` for a cart that was never created.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Cart {
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            book_ids: Vec::new(),
            updated_at: None,
        }
    }

    pub fn contains(&self, book_id: i64) -> bool {
        self.book_ids.binary_search(&book_id).is_ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddBooksRequest {
    #[serde(default)]
    pub book_ids: Vec<i64>,
}

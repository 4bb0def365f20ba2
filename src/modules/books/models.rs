use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::Pagination;

/// A catalog entry. `amount` is units in stock and never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub category_id: i64,
    /// Price in minor currency units.
    pub price: i64,
    pub amount: i32,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of create and update requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub category_id: i64,
    #[serde(default)]
    pub amount: i32,
}

/// Query string of the list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListBooksQuery {
    /// Comma-separated category ids; absent means every category.
    pub category_ids: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookPage {
    pub books: Vec<Book>,
    pub meta: PageMeta,
}

impl BookPage {
    pub fn new(books: Vec<Book>, pagination: Pagination, total: i64) -> Self {
        Self {
            books,
            meta: PageMeta {
                page: pagination.page,
                limit: pagination.limit,
                total,
            },
        }
    }
}

use async_trait::async_trait;

use bookstore_db::{Database, DbError};

use super::models::{Book, BookInput};

const BOOK_COLUMNS: &str =
    "id, title, author, category_id, price, amount, year, created_at, updated_at";

#[async_trait]
pub trait BookStore: Send + Sync {
    /// An unknown category surfaces as `DbError::ForeignKeyViolation`.
    async fn create(&self, input: &BookInput) -> Result<Book, DbError>;
    async fn get(&self, id: i64) -> Result<Option<Book>, DbError>;
    async fn update(&self, id: i64, input: &BookInput) -> Result<Option<Book>, DbError>;
    async fn delete(&self, id: i64) -> Result<bool, DbError>;

    /// One page of books ordered by id, plus the total matching count.
    /// An empty `category_ids` matches every category.
    async fn list(
        &self,
        category_ids: &[i64],
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Book>, i64), DbError>;
}

pub struct PgBookStore {
    db: Database,
}

impl PgBookStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn create(&self, input: &BookInput) -> Result<Book, DbError> {
        let sql = format!(
            "INSERT INTO books (title, author, category_id, price, amount, year) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {BOOK_COLUMNS}"
        );
        let book = sqlx::query_as::<_, Book>(&sql)
            .bind(&input.title)
            .bind(&input.author)
            .bind(input.category_id)
            .bind(input.price)
            .bind(input.amount)
            .bind(input.year)
            .fetch_one(self.db.pool())
            .await?;
        Ok(book)
    }

    async fn get(&self, id: i64) -> Result<Option<Book>, DbError> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        let book = sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(book)
    }

    async fn update(&self, id: i64, input: &BookInput) -> Result<Option<Book>, DbError> {
        let sql = format!(
            "UPDATE books SET title = $1, author = $2, category_id = $3, price = $4, \
             amount = $5, year = $6, updated_at = NOW() \
             WHERE id = $7 RETURNING {BOOK_COLUMNS}"
        );
        let book = sqlx::query_as::<_, Book>(&sql)
            .bind(&input.title)
            .bind(&input.author)
            .bind(input.category_id)
            .bind(input.price)
            .bind(input.amount)
            .bind(input.year)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(book)
    }

    async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        category_ids: &[i64],
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Book>, i64), DbError> {
        // NULL array means "no category filter".
        let filter: Option<&[i64]> = (!category_ids.is_empty()).then_some(category_ids);

        let sql = format!(
            "SELECT {BOOK_COLUMNS} FROM books \
             WHERE $1::bigint[] IS NULL OR category_id = ANY($1) \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        let books = sqlx::query_as::<_, Book>(&sql)
            .bind(filter)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM books WHERE $1::bigint[] IS NULL OR category_id = ANY($1)",
        )
        .bind(filter)
        .fetch_one(self.db.pool())
        .await?;

        Ok((books, total))
    }
}

/// Book store kept in process memory. Category references are not checked.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct InMemoryBookStore {
    books: tokio::sync::Mutex<std::collections::BTreeMap<i64, Book>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn create(&self, input: &BookInput) -> Result<Book, DbError> {
        let mut books = self.books.lock().await;
        let id = books.keys().next_back().map_or(1, |last| last + 1);
        let now = chrono::Utc::now();
        let book = Book {
            id,
            title: input.title.clone(),
            author: input.author.clone(),
            category_id: input.category_id,
            price: input.price,
            amount: input.amount,
            year: input.year,
            created_at: now,
            updated_at: now,
        };
        books.insert(id, book.clone());
        Ok(book)
    }

    async fn get(&self, id: i64) -> Result<Option<Book>, DbError> {
        Ok(self.books.lock().await.get(&id).cloned())
    }

    async fn update(&self, id: i64, input: &BookInput) -> Result<Option<Book>, DbError> {
        let mut books = self.books.lock().await;
        Ok(books.get_mut(&id).map(|book| {
            book.title = input.title.clone();
            book.author = input.author.clone();
            book.category_id = input.category_id;
            book.price = input.price;
            book.amount = input.amount;
            book.year = input.year;
            book.updated_at = chrono::Utc::now();
            book.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool, DbError> {
        Ok(self.books.lock().await.remove(&id).is_some())
    }

    async fn list(
        &self,
        category_ids: &[i64],
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Book>, i64), DbError> {
        let books = self.books.lock().await;
        let matching: Vec<&Book> = books
            .values()
            .filter(|book| category_ids.is_empty() || category_ids.contains(&book.category_id))
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok((page, total))
    }
}

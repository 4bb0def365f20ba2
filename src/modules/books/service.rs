use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use bookstore_db::DbError;
use bookstore_http::AppError;

use super::models::{Book, BookInput, BookPage};
use super::store::BookStore;
use crate::utils::Pagination;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("{field} is {problem}")]
    Invalid {
        field: &'static str,
        problem: &'static str,
    },

    #[error("book {0} not found")]
    NotFound(i64),

    #[error("category {0} does not exist")]
    UnknownCategory(i64),

    #[error(transparent)]
    Store(DbError),
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        let message = err.to_string();
        match err {
            BookError::Invalid { field, problem } => AppError::invalid_field(field, problem),
            BookError::NotFound(_) => AppError::not_found(message).with_code("book_not_found"),
            BookError::UnknownCategory(id) => AppError::validation(
                vec![json!({ "field": "category_id", "error": "unknown", "category_id": id })],
                message,
            ),
            BookError::Store(db) => db.into(),
        }
    }
}

/// Reject input the catalog cannot store. Stock may be zero but not negative.
pub fn validate(input: &BookInput) -> Result<(), BookError> {
    let invalid = |field, problem| Err(BookError::Invalid { field, problem });

    if input.title.trim().is_empty() {
        return invalid("title", "required");
    }
    if input.author.trim().is_empty() {
        return invalid("author", "required");
    }
    if input.year == 0 {
        return invalid("year", "required");
    }
    if input.price <= 0 {
        return invalid("price", "required");
    }
    if input.category_id <= 0 {
        return invalid("category_id", "required");
    }
    if input.amount < 0 {
        return invalid("amount", "negative");
    }
    Ok(())
}

pub struct BookService {
    store: Arc<dyn BookStore>,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: &BookInput) -> Result<Book, BookError> {
        validate(input)?;
        self.store
            .create(input)
            .await
            .map_err(|err| map_write_error(err, input.category_id))
    }

    pub async fn get(&self, id: i64) -> Result<Book, BookError> {
        self.store
            .get(id)
            .await
            .map_err(BookError::Store)?
            .ok_or(BookError::NotFound(id))
    }

    pub async fn update(&self, id: i64, input: &BookInput) -> Result<Book, BookError> {
        validate(input)?;
        self.store
            .update(id, input)
            .await
            .map_err(|err| map_write_error(err, input.category_id))?
            .ok_or(BookError::NotFound(id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), BookError> {
        if !self.store.delete(id).await.map_err(BookError::Store)? {
            return Err(BookError::NotFound(id));
        }
        Ok(())
    }

    pub async fn list(
        &self,
        category_ids: &[i64],
        pagination: Pagination,
    ) -> Result<BookPage, BookError> {
        let (books, total) = self
            .store
            .list(category_ids, pagination.limit, pagination.offset())
            .await
            .map_err(BookError::Store)?;
        Ok(BookPage::new(books, pagination, total))
    }
}

fn map_write_error(err: DbError, category_id: i64) -> BookError {
    match err {
        DbError::ForeignKeyViolation(_) => BookError::UnknownCategory(category_id),
        DbError::CheckViolation(_) => BookError::Invalid {
            field: "amount",
            problem: "negative",
        },
        other => BookError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::store::InMemoryBookStore;

    fn input() -> BookInput {
        BookInput {
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            year: 1965,
            price: 1299,
            category_id: 1,
            amount: 3,
        }
    }

    #[test]
    fn validation_names_the_first_bad_field() {
        assert!(validate(&input()).is_ok());

        let cases: [(fn(&mut BookInput), &str); 6] = [
            (|b| b.title.clear(), "title"),
            (|b| b.author = "  ".into(), "author"),
            (|b| b.year = 0, "year"),
            (|b| b.price = 0, "price"),
            (|b| b.category_id = 0, "category_id"),
            (|b| b.amount = -1, "amount"),
        ];
        for (mutate, expected) in cases {
            let mut book = input();
            mutate(&mut book);
            match validate(&book) {
                Err(BookError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn zero_stock_is_allowed() {
        let mut book = input();
        book.amount = 0;
        assert!(validate(&book).is_ok());
    }

    #[tokio::test]
    async fn list_filters_and_pages() {
        let books = BookService::new(Arc::new(InMemoryBookStore::new()));
        for i in 0..60 {
            let mut book = input();
            book.category_id = if i % 2 == 0 { 1 } else { 2 };
            books.create(&book).await.unwrap();
        }

        let page = books.list(&[1], Pagination::new(Some(1), Some(50))).await.unwrap();
        assert_eq!(page.meta.total, 30);
        assert_eq!(page.books.len(), 30);
        assert!(page.books.iter().all(|b| b.category_id == 1));

        let page = books.list(&[], Pagination::new(Some(2), Some(50))).await.unwrap();
        assert_eq!(page.meta.total, 60);
        assert_eq!(page.books.len(), 10);
        assert_eq!(page.meta.page, 2);
    }

    #[tokio::test]
    async fn missing_book_is_not_found() {
        let books = BookService::new(Arc::new(InMemoryBookStore::new()));
        assert!(matches!(books.get(5).await.unwrap_err(), BookError::NotFound(5)));
        assert!(matches!(books.delete(5).await.unwrap_err(), BookError::NotFound(5)));
        assert!(matches!(
            books.update(5, &input()).await.unwrap_err(),
            BookError::NotFound(5)
        ));
    }
}

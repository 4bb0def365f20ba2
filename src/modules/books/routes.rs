use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use bookstore_http::AppError;

use super::models::{Book, BookInput, BookPage, ListBooksQuery};
use crate::app::Services;
use crate::modules::auth::AdminUser;
use crate::utils::{parse_id_list, Pagination};

pub async fn list_books(
    State(services): State<Services>,
    Query(query): Query<ListBooksQuery>,
) -> Result<Json<BookPage>, AppError> {
    let category_ids = match query.category_ids.as_deref() {
        Some(raw) => parse_id_list(raw).map_err(|segment| {
            AppError::bad_request(format!("invalid category id: {segment:?}"))
                .with_code("invalid_category_ids")
        })?,
        None => Vec::new(),
    };
    let pagination = Pagination::new(query.page, query.limit);
    Ok(Json(services.books.list(&category_ids, pagination).await?))
}

pub async fn get_book(
    State(services): State<Services>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(services.books.get(id).await?))
}

pub async fn create_book(
    State(services): State<Services>,
    AdminUser(admin): AdminUser,
    Json(input): Json<BookInput>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = services.books.create(&input).await?;
    tracing::info!(user_id = admin.id, book_id = book.id, amount = book.amount, "book created");
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn update_book(
    State(services): State<Services>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(input): Json<BookInput>,
) -> Result<Json<Book>, AppError> {
    let book = services.books.update(id, &input).await?;
    tracing::info!(user_id = admin.id, book_id = id, "book updated");
    Ok(Json(book))
}

pub async fn delete_book(
    State(services): State<Services>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    services.books.delete(id).await?;
    tracing::info!(user_id = admin.id, book_id = id, "book deleted");
    Ok(StatusCode::NO_CONTENT)
}

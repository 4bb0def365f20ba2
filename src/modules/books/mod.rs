//! Book catalog: public browsing and admin-only maintenance.

pub mod models;
pub mod routes;
pub mod service;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::get, Router};
use serde_json::json;

use bookstore_kernel::{InitCtx, Migration, Module};

use crate::app::Services;

pub use service::{BookError, BookService};

pub struct BooksModule {
    services: Services,
}

impl BooksModule {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(routes::list_books).post(routes::create_book))
            .route(
                "/{id}",
                get(routes::get_book)
                    .put(routes::update_book)
                    .delete(routes::delete_book),
            )
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let book = json!({
            "description": "Book",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Book" } } }
        });
        let body = json!({
            "required": true,
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/BookInput" } } }
        });
        let error = |description: &str| {
            json!({
                "description": description,
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
            })
        };
        let id_param = json!([
            { "name": "id", "in": "path", "required": true, "schema": { "type": "integer", "format": "int64" } }
        ]);
        let admin = json!([{ "bearerAuth": [] }]);

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books, optionally filtered by category",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "category_ids", "in": "query", "required": false,
                                "description": "Comma-separated category ids",
                                "schema": { "type": "string" }
                            },
                            { "name": "page", "in": "query", "required": false, "schema": { "type": "integer", "minimum": 1 } },
                            { "name": "limit", "in": "query", "required": false, "schema": { "type": "integer", "minimum": 50, "maximum": 100 } }
                        ],
                        "responses": {
                            "200": {
                                "description": "One page of books",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/BookPage" } } }
                            },
                            "400": error("Malformed category id list")
                        }
                    },
                    "post": {
                        "summary": "Add a book (admin)",
                        "tags": ["Books"],
                        "security": admin.clone(),
                        "requestBody": body.clone(),
                        "responses": {
                            "201": book.clone(),
                            "422": error("Invalid book or unknown category")
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "parameters": id_param.clone(),
                        "responses": { "200": book.clone(), "404": error("No such book") }
                    },
                    "put": {
                        "summary": "Replace a book (admin)",
                        "tags": ["Books"],
                        "security": admin.clone(),
                        "parameters": id_param.clone(),
                        "requestBody": body,
                        "responses": {
                            "200": book,
                            "404": error("No such book"),
                            "422": error("Invalid book or unknown category")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book (admin)",
                        "tags": ["Books"],
                        "security": admin,
                        "parameters": id_param,
                        "responses": { "204": { "description": "Deleted" }, "404": error("No such book") }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "format": "int64" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "category_id": { "type": "integer", "format": "int64" },
                            "price": { "type": "integer", "format": "int64", "description": "Minor currency units" },
                            "amount": { "type": "integer", "minimum": 0, "description": "Units in stock" },
                            "year": { "type": "integer" },
                            "created_at": { "type": "string", "format": "date-time" },
                            "updated_at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "title", "author", "category_id", "price", "amount", "year"]
                    },
                    "BookInput": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "year": { "type": "integer" },
                            "price": { "type": "integer", "format": "int64", "exclusiveMinimum": 0 },
                            "category_id": { "type": "integer", "format": "int64" },
                            "amount": { "type": "integer", "minimum": 0 }
                        },
                        "required": ["title", "author", "year", "price", "category_id"]
                    },
                    "BookPage": {
                        "type": "object",
                        "properties": {
                            "books": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } },
                            "meta": {
                                "type": "object",
                                "properties": {
                                    "page": { "type": "integer" },
                                    "limit": { "type": "integer" },
                                    "total": { "type": "integer" }
                                }
                            }
                        },
                        "required": ["books", "meta"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0003_create_books",
            up: r#"
                CREATE TABLE IF NOT EXISTS books (
                    id          BIGSERIAL PRIMARY KEY,
                    title       TEXT NOT NULL,
                    author      TEXT NOT NULL,
                    category_id BIGINT NOT NULL REFERENCES categories (id) ON DELETE RESTRICT,
                    price       BIGINT NOT NULL CHECK (price > 0),
                    amount      INTEGER NOT NULL DEFAULT 0 CHECK (amount >= 0),
                    year        INTEGER NOT NULL,
                    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX IF NOT EXISTS books_category_id_idx ON books (category_id);
                "#,
        }]
    }
}

pub fn create_module(services: Services) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(services))
}

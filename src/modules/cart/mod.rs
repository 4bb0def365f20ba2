pub mod models;
pub mod service;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::Mutex;

use bookstore_http::AppError;
use bookstore_kernel::{InitCtx, Migration, Module, PeriodicTask};

use crate::app::Services;
use crate::modules::auth::CurrentUser;
use models::{AddBooksRequest, Cart};

pub use service::{CartError, CartPolicy, CartService};

const SWEEPER_STOP_GRACE: Duration = Duration::from_secs(5);

/// Carts that reserve stock as books are added, plus the idle-cart sweep.
pub struct CartModule {
    services: Services,
    sweeper: Mutex<Option<PeriodicTask>>,
}

impl CartModule {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            sweeper: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Module for CartModule {
    fn name(&self) -> &'static str {
        "cart"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            idle_threshold_secs = ctx.settings.cart.idle_threshold_secs,
            "cart module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(get_cart))
            .route("/items", post(add_items))
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let cart_response = json!({
            "description": "The caller's cart",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Cart" } } }
        });
        let error = |description: &str| {
            json!({
                "description": description,
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
            })
        };

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Current user's cart",
                        "tags": ["Cart"],
                        "security": [{ "bearerAuth": [] }],
                        "responses": {
                            "200": cart_response.clone(),
                            "401": error("Missing or invalid token")
                        }
                    }
                },
                "/items": {
                    "post": {
                        "summary": "Reserve books and add them to the cart",
                        "description": "All or nothing: if any book is out of stock nothing is reserved.",
                        "tags": ["Cart"],
                        "security": [{ "bearerAuth": [] }],
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/AddBooksRequest" } } }
                        },
                        "responses": {
                            "200": cart_response,
                            "401": error("Missing or invalid token"),
                            "409": error("A requested book is out of stock; details name the book_id"),
                            "422": error("Empty or invalid book id list"),
                            "503": error("Transient failure; safe to retry")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Cart": {
                        "type": "object",
                        "properties": {
                            "user_id": { "type": "integer", "format": "int64" },
                            "book_ids": { "type": "array", "items": { "type": "integer", "format": "int64" } },
                            "updated_at": { "type": ["string", "null"], "format": "date-time" }
                        },
                        "required": ["user_id", "book_ids"]
                    },
                    "AddBooksRequest": {
                        "type": "object",
                        "properties": {
                            "book_ids": { "type": "array", "items": { "type": "integer", "format": "int64" }, "minItems": 1 }
                        },
                        "required": ["book_ids"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0005_create_carts",
            up: r#"
                CREATE TABLE IF NOT EXISTS carts (
                    user_id    BIGINT PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE,
                    book_ids   BIGINT[] NOT NULL DEFAULT '{}',
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX IF NOT EXISTS carts_updated_at_idx ON carts (updated_at);
                "#,
        }]
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let carts = Arc::clone(&self.services.carts);
        let task = PeriodicTask::spawn("cart-sweeper", ctx.settings.cart.sweep_interval(), move || {
            let carts = Arc::clone(&carts);
            async move { carts.cleanup_expired().await.map(|_| ()) }
        });

        if let Some(previous) = self.sweeper.lock().await.replace(task) {
            previous.stop(SWEEPER_STOP_GRACE).await?;
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let task = self.sweeper.lock().await.take();
        if let Some(task) = task {
            task.stop(SWEEPER_STOP_GRACE).await?;
        }
        tracing::info!(module = self.name(), "cart module stopped");
        Ok(())
    }
}

async fn get_cart(
    State(services): State<Services>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(services.carts.cart(identity.id).await?))
}

async fn add_items(
    State(services): State<Services>,
    CurrentUser(identity): CurrentUser,
    Json(request): Json<AddBooksRequest>,
) -> Result<Json<Cart>, AppError> {
    let cart = services.carts.add_books(identity.id, request.book_ids).await?;
    Ok(Json(cart))
}

pub fn create_module(services: Services) -> Arc<dyn Module> {
    Arc::new(CartModule::new(services))
}

pub mod models;
pub mod password;
pub mod service;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::{routing::get, Json, Router};
use serde_json::json;

use bookstore_authz::require_self_or_admin;
use bookstore_http::AppError;
use bookstore_kernel::{InitCtx, Migration, Module};

use crate::app::Services;
use crate::modules::auth::extract::CurrentUser;
use models::User;

pub use service::{UserError, UserService};

/// Account lookup. Sign-up and sign-in live in the `auth` module.
pub struct UsersModule {
    services: Services,
}

impl UsersModule {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "users module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/me", get(me))
            .route("/{id}", get(get_user))
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let user_response = json!({
            "200": {
                "description": "User",
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/User" } } }
            },
            "401": {
                "description": "Missing or invalid token",
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
            }
        });

        Some(json!({
            "paths": {
                "/me": {
                    "get": {
                        "summary": "Current user",
                        "tags": ["Users"],
                        "security": [{ "bearerAuth": [] }],
                        "responses": user_response.clone()
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get user by id (self or admin)",
                        "tags": ["Users"],
                        "security": [{ "bearerAuth": [] }],
                        "parameters": [
                            { "name": "id", "in": "path", "required": true, "schema": { "type": "integer", "format": "int64" } }
                        ],
                        "responses": user_response
                    }
                }
            },
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "format": "int64" },
                            "email": { "type": "string", "format": "email" },
                            "is_admin": { "type": "boolean" },
                            "created_at": { "type": "string", "format": "date-time" },
                            "updated_at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "email", "is_admin", "created_at", "updated_at"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0001_create_users",
            up: r#"
                CREATE TABLE IF NOT EXISTS users (
                    id            BIGSERIAL PRIMARY KEY,
                    email         TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    is_admin      BOOLEAN NOT NULL DEFAULT FALSE,
                    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                "#,
        }]
    }
}

async fn me(
    State(services): State<Services>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<User>, AppError> {
    Ok(Json(services.users.get(identity.id).await?))
}

async fn get_user(
    State(services): State<Services>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<User>, AppError> {
    require_self_or_admin(&identity, id)?;
    Ok(Json(services.users.get(id).await?))
}

pub fn create_module(services: Services) -> Arc<dyn Module> {
    Arc::new(UsersModule::new(services))
}

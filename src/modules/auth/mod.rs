//! Sign-up, sign-in, logout and the session token lifecycle.

pub mod claims;
pub mod extract;
pub mod routes;
pub mod service;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{routing::post, Router};
use serde_json::json;
use tokio::sync::Mutex;

use bookstore_http::AppError;
use bookstore_kernel::{InitCtx, Migration, Module, PeriodicTask};

use crate::app::Services;

pub use extract::{AdminUser, BearerToken, CurrentUser};
pub use service::{IssuedToken, TokenConfig, TokenError, TokenService};

const SWEEPER_STOP_GRACE: Duration = Duration::from_secs(5);

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        let message = err.to_string();
        match err {
            TokenError::Malformed | TokenError::InvalidSignature | TokenError::AlgorithmMismatch => {
                AppError::unauthorized(message).with_code("invalid_token")
            }
            TokenError::Expired => AppError::unauthorized(message).with_code("token_expired"),
            TokenError::Revoked => AppError::unauthorized(message).with_code("token_revoked"),
            TokenError::NotFound => AppError::not_found(message).with_code("token_not_found"),
            TokenError::DeadlineExceeded => {
                AppError::unavailable(message).with_code("deadline_exceeded")
            }
            TokenError::Signing(_) => AppError::Internal(anyhow::anyhow!(message)),
            TokenError::Store(db) => db.into(),
        }
    }
}

pub struct AuthModule {
    services: Services,
    sweeper: Mutex<Option<PeriodicTask>>,
}

impl AuthModule {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            sweeper: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            ttl_secs = ctx.settings.auth.token_ttl_secs,
            check_revocation = ctx.settings.auth.check_revocation,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/signup", post(routes::signup))
            .route("/signin", post(routes::signin))
            .route("/logout", post(routes::logout))
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let credentials_body = json!({
            "required": true,
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Credentials" } } }
        });
        let error = |description: &str| {
            json!({
                "description": description,
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
            })
        };

        Some(json!({
            "paths": {
                "/signup": {
                    "post": {
                        "summary": "Create an account",
                        "tags": ["Auth"],
                        "requestBody": credentials_body.clone(),
                        "responses": {
                            "201": {
                                "description": "Account created",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/User" } } }
                            },
                            "409": error("Email already registered"),
                            "422": error("Invalid email or password")
                        }
                    }
                },
                "/signin": {
                    "post": {
                        "summary": "Exchange credentials for a session token",
                        "tags": ["Auth"],
                        "requestBody": credentials_body,
                        "responses": {
                            "200": {
                                "description": "Session token",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/IssuedToken" } } }
                            },
                            "401": error("Invalid credentials")
                        }
                    }
                },
                "/logout": {
                    "post": {
                        "summary": "Revoke the presented session token",
                        "tags": ["Auth"],
                        "security": [{ "bearerAuth": [] }],
                        "responses": {
                            "200": { "description": "Token revoked" },
                            "401": error("Invalid token"),
                            "404": error("Token already revoked")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Credentials": {
                        "type": "object",
                        "properties": {
                            "email": { "type": "string", "format": "email" },
                            "password": { "type": "string", "format": "password" }
                        },
                        "required": ["email", "password"]
                    },
                    "IssuedToken": {
                        "type": "object",
                        "properties": {
                            "token": { "type": "string" },
                            "expires_at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["token", "expires_at"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0004_create_user_tokens",
            up: r#"
                CREATE TABLE IF NOT EXISTS user_tokens (
                    user_id    BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    token      TEXT NOT NULL UNIQUE,
                    expires_at TIMESTAMPTZ NOT NULL
                );
                CREATE INDEX IF NOT EXISTS user_tokens_expires_at_idx ON user_tokens (expires_at);
                "#,
        }]
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let tokens = Arc::clone(&self.services.tokens);
        let task = PeriodicTask::spawn(
            "token-sweeper",
            ctx.settings.auth.token_sweep_interval(),
            move || {
                let tokens = Arc::clone(&tokens);
                async move { tokens.cleanup_expired().await.map(|_| ()) }
            },
        );

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
        tracing::info!(module = self.name(), "auth module stopped");
        Ok(())
    }
}

pub fn create_module(services: Services) -> Arc<dyn Module> {
    Arc::new(AuthModule::new(services))
}

pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use bookstore_db::DbError;
use bookstore_http::AppError;
use bookstore_kernel::{InitCtx, Migration, Module};

use crate::app::Services;
use crate::modules::auth::AdminUser;
use store::{Category, CategoryStore};

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("name is required")]
    MissingName,

    #[error("category {0} not found")]
    NotFound(i64),

    #[error("a category with this name already exists")]
    NameTaken,

    #[error("category {0} still has books")]
    InUse(i64),

    #[error(transparent)]
    Store(DbError),
}

impl From<CategoryError> for AppError {
    fn from(err: CategoryError) -> Self {
        let message = err.to_string();
        match err {
            CategoryError::MissingName => AppError::invalid_field("name", "required"),
            CategoryError::NotFound(_) => AppError::not_found(message).with_code("category_not_found"),
            CategoryError::NameTaken => AppError::conflict(vec![], message).with_code("category_exists"),
            CategoryError::InUse(id) => {
                AppError::conflict(vec![json!({ "category_id": id })], message).with_code("category_in_use")
            }
            CategoryError::Store(db) => db.into(),
        }
    }
}

pub struct CategoryService {
    store: Arc<dyn CategoryStore>,
}

impl CategoryService {
    pub fn new(store: Arc<dyn CategoryStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, name: &str) -> Result<Category, CategoryError> {
        let name = normalize(name)?;
        self.store.create(name).await.map_err(|err| match err {
            DbError::UniqueViolation(_) => CategoryError::NameTaken,
            other => CategoryError::Store(other),
        })
    }

    pub async fn get(&self, id: i64) -> Result<Category, CategoryError> {
        self.store
            .get(id)
            .await
            .map_err(CategoryError::Store)?
            .ok_or(CategoryError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Category>, CategoryError> {
        self.store.list().await.map_err(CategoryError::Store)
    }

    pub async fn update(&self, id: i64, name: &str) -> Result<Category, CategoryError> {
        let name = normalize(name)?;
        self.store
            .update(id, name)
            .await
            .map_err(|err| match err {
                DbError::UniqueViolation(_) => CategoryError::NameTaken,
                other => CategoryError::Store(other),
            })?
            .ok_or(CategoryError::NotFound(id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), CategoryError> {
        let deleted = self.store.delete(id).await.map_err(|err| match err {
            DbError::ForeignKeyViolation(_) => CategoryError::InUse(id),
            other => CategoryError::Store(other),
        })?;
        if !deleted {
            return Err(CategoryError::NotFound(id));
        }
        Ok(())
    }
}

fn normalize(name: &str) -> Result<&str, CategoryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryError::MissingName);
    }
    Ok(name)
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
}

pub struct CategoriesModule {
    services: Services,
}

impl CategoriesModule {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Module for CategoriesModule {
    fn name(&self) -> &'static str {
        "categories"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "categories module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_categories).post(create_category))
            .route(
                "/{id}",
                get(get_category).put(update_category).delete(delete_category),
            )
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let category = json!({
            "description": "Category",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Category" } } }
        });
        let body = json!({
            "required": true,
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/CategoryRequest" } } }
        });
        let id_param = json!([
            { "name": "id", "in": "path", "required": true, "schema": { "type": "integer", "format": "int64" } }
        ]);
        let admin = json!([{ "bearerAuth": [] }]);

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List categories",
                        "tags": ["Categories"],
                        "responses": {
                            "200": {
                                "description": "All categories",
                                "content": { "application/json": { "schema": {
                                    "type": "array", "items": { "$ref": "#/components/schemas/Category" }
                                } } }
                            }
                        }
                    },
                    "post": {
                        "summary": "Create a category (admin)",
                        "tags": ["Categories"],
                        "security": admin.clone(),
                        "requestBody": body.clone(),
                        "responses": { "201": category.clone() }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a category",
                        "tags": ["Categories"],
                        "parameters": id_param.clone(),
                        "responses": { "200": category.clone() }
                    },
                    "put": {
                        "summary": "Rename a category (admin)",
                        "tags": ["Categories"],
                        "security": admin.clone(),
                        "parameters": id_param.clone(),
                        "requestBody": body,
                        "responses": { "200": category }
                    },
                    "delete": {
                        "summary": "Delete a category (admin)",
                        "tags": ["Categories"],
                        "security": admin,
                        "parameters": id_param,
                        "responses": { "204": { "description": "Deleted" } }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Category": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "format": "int64" },
                            "name": { "type": "string" },
                            "created_at": { "type": "string", "format": "date-time" },
                            "updated_at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "name"]
                    },
                    "CategoryRequest": {
                        "type": "object",
                        "properties": { "name": { "type": "string" } },
                        "required": ["name"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0002_create_categories",
            up: r#"
                CREATE TABLE IF NOT EXISTS categories (
                    id         BIGSERIAL PRIMARY KEY,
                    name       TEXT NOT NULL UNIQUE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                "#,
        }]
    }
}

async fn list_categories(State(services): State<Services>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(services.categories.list().await?))
}

async fn get_category(
    State(services): State<Services>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(services.categories.get(id).await?))
}

async fn create_category(
    State(services): State<Services>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = services.categories.create(&request.name).await?;
    tracing::info!(user_id = admin.id, category_id = category.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(services): State<Services>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let category = services.categories.update(id, &request.name).await?;
    tracing::info!(user_id = admin.id, category_id = id, "category updated");
    Ok(Json(category))
}

async fn delete_category(
    State(services): State<Services>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    services.categories.delete(id).await?;
    tracing::info!(user_id = admin.id, category_id = id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_module(services: Services) -> Arc<dyn Module> {
    Arc::new(CategoriesModule::new(services))
}

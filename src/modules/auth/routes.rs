use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use bookstore_http::AppError;

use super::extract::BearerToken;
use super::service::IssuedToken;
use crate::app::Services;
use crate::modules::users::models::{Credentials, User};

pub async fn signup(
    State(services): State<Services>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = services.users.register(&credentials).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn signin(
    State(services): State<Services>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<IssuedToken>, AppError> {
    let identity = services.users.authenticate(&credentials).await?;
    let issued = services.tokens.issue(&identity).await?;
    tracing::info!(user_id = identity.id, "user signed in");
    Ok(Json(issued))
}

/// Revoke the presented token. The token must still carry a valid
/// signature, but a token that was already revoked reports not found.
pub async fn logout(
    State(services): State<Services>,
    BearerToken(token): BearerToken,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = services.tokens.decode(&token)?;
    services.tokens.revoke(&token).await?;
    tracing::info!(user_id = claims.user_id, "user logged out");
    Ok(Json(json!({ "message": "logged out" })))
}

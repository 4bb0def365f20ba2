//! Axum extractors that turn an `Authorization: Bearer` header into an
//! explicit [`Identity`] for handlers.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use bookstore_authz::{require_admin, Identity};
use bookstore_http::AppError;

use super::service::TokenService;

const BEARER_SCHEME: &str = "bearer";

/// The raw token from the `Authorization` header, not yet validated.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::unauthorized("missing authorization header").with_code("missing_token"))?
            .to_str()
            .map_err(|_| AppError::unauthorized("authorization header is not valid text").with_code("invalid_token_format"))?;

        let (scheme, token) = header
            .split_once(' ')
            .ok_or_else(|| AppError::unauthorized("expected a bearer token").with_code("invalid_token_format"))?;
        if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
            return Err(AppError::unauthorized("expected a bearer token").with_code("invalid_token_format"));
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::unauthorized("bearer token is empty").with_code("empty_token"));
        }

        Ok(BearerToken(token.to_string()))
    }
}

/// Any authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let tokens = Arc::<TokenService>::from_ref(state);
        let identity = tokens.validate(&token).await?;
        Ok(CurrentUser(identity))
    }
}

/// An authenticated caller holding the admin flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl<S> FromRequestParts<S> for AdminUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;
        require_admin(&identity)?;
        Ok(AdminUser(identity))
    }
}

//! Session token lifecycle against the in-memory token store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

use bookstore_app::modules::auth::memory::InMemoryTokenStore;
use bookstore_app::modules::auth::store::{TokenRecord, TokenStore};
use bookstore_app::modules::auth::{TokenConfig, TokenError, TokenService};
use bookstore_authz::Identity;

const SECRET: &[u8] = b"integration-secret-integration-secret";

fn setup() -> (TokenService, Arc<InMemoryTokenStore>) {
    let store = Arc::new(InMemoryTokenStore::new());
    let service = TokenService::new(TokenConfig::new(SECRET, Duration::from_secs(3600)), store.clone());
    (service, store)
}

fn identity() -> Identity {
    Identity {
        id: 42,
        email: "reader@example.com".to_string(),
        is_admin: false,
    }
}

fn forged(algorithm: Algorithm, exp: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = json!({
        "user_id": 42,
        "email": "reader@example.com",
        "is_admin": true,
        "iat": now - 10,
        "exp": exp,
        "jti": "forged",
    });
    encode(&Header::new(algorithm), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

#[tokio::test]
async fn issued_token_validates_to_the_same_identity() {
    let (tokens, store) = setup();
    let issued = tokens.issue(&identity()).await.unwrap();

    let ttl = issued.expires_at - Utc::now();
    assert!(ttl <= chrono::Duration::hours(1));
    assert!(ttl > chrono::Duration::minutes(59));
    assert_eq!(store.len().await, 1);

    assert_eq!(tokens.validate(&issued.token).await.unwrap(), identity());
}

#[tokio::test]
async fn tokens_issued_back_to_back_are_distinct() {
    let (tokens, store) = setup();
    let first = tokens.issue(&identity()).await.unwrap();
    let second = tokens.issue(&identity()).await.unwrap();
    assert_ne!(first.token, second.token);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let (tokens, _) = setup();
    let token = forged(Algorithm::HS256, Utc::now().timestamp() - 1);
    assert!(matches!(tokens.validate(&token).await.unwrap_err(), TokenError::Expired));
}

#[tokio::test]
async fn other_algorithm_is_rejected_even_with_the_right_secret() {
    let (tokens, _) = setup();
    let token = forged(Algorithm::HS512, Utc::now().timestamp() + 600);
    assert!(matches!(
        tokens.validate(&token).await.unwrap_err(),
        TokenError::AlgorithmMismatch
    ));
}

#[tokio::test]
async fn foreign_secret_and_garbage_are_rejected() {
    let (tokens, _) = setup();
    let other = TokenService::new(
        TokenConfig::new(b"some-other-secret-some-other-secret", Duration::from_secs(3600)),
        Arc::new(InMemoryTokenStore::new()),
    );
    let foreign = other.issue(&identity()).await.unwrap();

    assert!(matches!(
        tokens.validate(&foreign.token).await.unwrap_err(),
        TokenError::InvalidSignature
    ));
    assert!(matches!(
        tokens.validate("not-a-token").await.unwrap_err(),
        TokenError::Malformed
    ));
}

#[tokio::test]
async fn revoke_once_then_not_found() {
    let (tokens, store) = setup();
    let issued = tokens.issue(&identity()).await.unwrap();

    tokens.revoke(&issued.token).await.unwrap();
    assert!(store.is_empty().await);
    assert!(matches!(tokens.revoke(&issued.token).await.unwrap_err(), TokenError::NotFound));
    assert!(matches!(tokens.validate(&issued.token).await.unwrap_err(), TokenError::Revoked));
}

#[tokio::test]
async fn revocation_check_can_be_disabled() {
    let store = Arc::new(InMemoryTokenStore::new());
    let config = TokenConfig::new(SECRET, Duration::from_secs(3600)).with_revocation_check(false);
    let tokens = TokenService::new(config, store);

    let issued = tokens.issue(&identity()).await.unwrap();
    tokens.revoke(&issued.token).await.unwrap();
    assert_eq!(tokens.validate(&issued.token).await.unwrap().id, 42);
}

#[tokio::test]
async fn cleanup_removes_only_expired_records() {
    let (tokens, store) = setup();
    let live = tokens.issue(&identity()).await.unwrap();
    store
        .save(&TokenRecord {
            user_id: 42,
            token: "stale".to_string(),
            expires_at: Utc::now() - chrono::Duration::seconds(5),
        })
        .await
        .unwrap();

    assert_eq!(tokens.cleanup_expired().await.unwrap(), 1);
    assert_eq!(tokens.cleanup_expired().await.unwrap(), 0);
    assert!(tokens.validate(&live.token).await.is_ok());
}

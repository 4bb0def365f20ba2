//! Session token lifecycle: issue, validate, revoke, sweep.
//!
//! Tokens are HS256 JWTs signed with a key that lives in a [`TokenConfig`]
//! built once at startup. Every issued token is also recorded in a
//! [`TokenStore`] so it can be revoked before it expires, and a background
//! sweep drops records whose expiry has passed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use bookstore_authz::Identity;
use bookstore_db::DbError;
use bookstore_kernel::settings::AuthSettings;

use super::claims::Claims;
use super::store::{TokenRecord, TokenStore};

const ALGORITHM: Algorithm = Algorithm::HS256;
const DEFAULT_SWEEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Key material and policy for session tokens.
#[derive(Clone)]
pub struct TokenConfig {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    check_revocation: bool,
    sweep_timeout: Duration,
}

impl TokenConfig {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            check_revocation: true,
            sweep_timeout: DEFAULT_SWEEP_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.jwt_secret.as_bytes(), settings.token_ttl())
            .with_revocation_check(settings.check_revocation)
            .with_sweep_timeout(settings.sweep_timeout())
    }

    /// When enabled, a token must still be on record to validate, so logout
    /// takes effect immediately.
    pub fn with_revocation_check(mut self, enabled: bool) -> Self {
        self.check_revocation = enabled;
        self
    }

    /// Upper bound on a single cleanup pass.
    pub fn with_sweep_timeout(mut self, timeout: Duration) -> Self {
        self.sweep_timeout = timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("key", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("check_revocation", &self.check_revocation)
            .field("sweep_timeout", &self.sweep_timeout)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token was signed with an unexpected algorithm")]
    AlgorithmMismatch,

    #[error("token has expired")]
    Expired,

    #[error("token has been revoked")]
    Revoked,

    #[error("token not found")]
    NotFound,

    #[error("token sweep did not finish in time")]
    DeadlineExceeded,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl TokenError {
    /// True for every failure that means "this caller is not authenticated".
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            TokenError::Malformed
                | TokenError::InvalidSignature
                | TokenError::AlgorithmMismatch
                | TokenError::Expired
                | TokenError::Revoked
        )
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::AlgorithmMismatch
            }
            _ => TokenError::Malformed,
        }
    }
}

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
}

pub struct TokenService {
    config: TokenConfig,
    store: Arc<dyn TokenStore>,
}

impl TokenService {
    pub fn new(config: TokenConfig, store: Arc<dyn TokenStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Sign a token for `identity` and record it.
    pub async fn issue(&self, identity: &Identity) -> Result<IssuedToken, TokenError> {
        let issued_at = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.ttl)
            .map_err(|_| TokenError::Signing("token ttl out of range".to_string()))?;
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing("token expiry out of range".to_string()))?;

        let claims = Claims::new(identity, issued_at, expires_at);
        let token = encode(&Header::new(ALGORITHM), &claims, &self.config.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))?;

        self.store
            .save(&TokenRecord {
                user_id: identity.id,
                token: token.clone(),
                expires_at: claims.expires_at(),
            })
            .await?;

        tracing::debug!(user_id = identity.id, %expires_at, "issued session token");
        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    /// Check signature, algorithm and expiry without consulting the store.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.config.decoding, &self.config.validation())?;
        Ok(data.claims)
    }

    /// Turn a presented token into the caller's identity.
    pub async fn validate(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = self.decode(token)?;

        if self.config.check_revocation && !self.store.exists(token).await? {
            tracing::debug!(user_id = claims.user_id, "rejected revoked token");
            return Err(TokenError::Revoked);
        }

        Ok(claims.identity())
    }

    /// Delete the token's record. A second revoke of the same token fails.
    pub async fn revoke(&self, token: &str) -> Result<(), TokenError> {
        if !self.store.delete(token).await? {
            return Err(TokenError::NotFound);
        }
        tracing::debug!("revoked session token");
        Ok(())
    }

    /// One sweep pass: drop every record whose expiry has passed.
    pub async fn cleanup_expired(&self) -> Result<u64, TokenError> {
        let removed = tokio::time::timeout(
            self.config.sweep_timeout,
            self.store.delete_expired(Utc::now()),
        )
        .await
        .map_err(|_| TokenError::DeadlineExceeded)??;
        if removed > 0 {
            tracing::debug!(removed, "swept expired tokens");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::memory::InMemoryTokenStore;

    const SECRET: &[u8] = b"unit-test-secret-unit-test-secret";

    fn service(store: Arc<InMemoryTokenStore>) -> TokenService {
        TokenService::new(TokenConfig::new(SECRET, Duration::from_secs(3600)), store)
    }

    fn reader() -> Identity {
        Identity {
            id: 42,
            email: "reader@example.com".into(),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn issued_token_validates_to_same_identity() {
        let store = Arc::new(InMemoryTokenStore::new());
        let tokens = service(Arc::clone(&store));

        let issued = tokens.issue(&reader()).await.unwrap();
        assert_eq!(tokens.validate(&issued.token).await.unwrap(), reader());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let tokens = service(Arc::new(InMemoryTokenStore::new()));
        let err = tokens.validate("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, TokenError::Malformed));
        assert!(err.is_authentication_failure());
    }

    #[tokio::test]
    async fn foreign_key_signature_is_rejected() {
        let tokens = service(Arc::new(InMemoryTokenStore::new()));
        let other = TokenService::new(
            TokenConfig::new(b"some-other-secret-entirely-000000", Duration::from_secs(3600)),
            Arc::new(InMemoryTokenStore::new()),
        );
        let issued = other.issue(&reader()).await.unwrap();

        let err = tokens.validate(&issued.token).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[tokio::test]
    async fn revocation_check_can_be_disabled() {
        let store = Arc::new(InMemoryTokenStore::new());
        let tokens = TokenService::new(
            TokenConfig::new(SECRET, Duration::from_secs(3600)).with_revocation_check(false),
            store,
        );
        let issued = tokens.issue(&reader()).await.unwrap();
        tokens.revoke(&issued.token).await.unwrap();

        assert_eq!(tokens.validate(&issued.token).await.unwrap(), reader());
    }

    struct StalledStore;

    #[async_trait::async_trait]
    impl TokenStore for StalledStore {
        async fn save(&self, _record: &TokenRecord) -> Result<(), DbError> {
            Ok(())
        }

        async fn delete(&self, _token: &str) -> Result<bool, DbError> {
            Ok(false)
        }

        async fn exists(&self, _token: &str) -> Result<bool, DbError> {
            Ok(false)
        }

        async fn delete_expired(&self, _now: chrono::DateTime<Utc>) -> Result<u64, DbError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_sweep_hits_the_deadline() {
        let config = TokenConfig::new(SECRET, Duration::from_secs(3600))
            .with_sweep_timeout(Duration::from_millis(250));
        let tokens = TokenService::new(config, Arc::new(StalledStore));

        let err = tokens.cleanup_expired().await.unwrap_err();
        assert!(matches!(err, TokenError::DeadlineExceeded));
        assert_eq!(
            bookstore_http::AppError::from(err).status(),
            axum::http::StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn debug_output_hides_key() {
        let config = TokenConfig::new(SECRET, Duration::from_secs(60));
        let rendered = format!("{config:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("unit-test-secret"));
    }
}

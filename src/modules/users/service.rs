use std::sync::Arc;

use thiserror::Error;

use bookstore_authz::Identity;
use bookstore_db::DbError;
use bookstore_http::AppError;

use super::models::{Credentials, User};
use super::password::{hash_password, verify_password};
use super::store::UserStore;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("email is required")]
    MissingEmail,

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("password is required")]
    MissingPassword,

    #[error("an account with this email already exists")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("user {0} not found")]
    NotFound(i64),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(DbError),
}

impl From<DbError> for UserError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation(_) => UserError::EmailTaken,
            other => UserError::Store(other),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        let message = err.to_string();
        match err {
            UserError::MissingEmail => AppError::invalid_field("email", "required"),
            UserError::InvalidEmail => AppError::invalid_field("email", "invalid"),
            UserError::MissingPassword => AppError::invalid_field("password", "required"),
            UserError::EmailTaken => {
                AppError::conflict(vec![], message).with_code("email_taken")
            }
            UserError::InvalidCredentials => {
                AppError::unauthorized(message).with_code("invalid_credentials")
            }
            UserError::NotFound(_) => AppError::not_found(message).with_code("user_not_found"),
            UserError::Hashing(_) => AppError::Internal(anyhow::anyhow!(message)),
            UserError::Store(db) => db.into(),
        }
    }
}

pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Create a regular (non-admin) account.
    pub async fn register(&self, credentials: &Credentials) -> Result<User, UserError> {
        self.create(credentials, false).await
    }

    /// Create an administrator. Only reachable from the operator CLI.
    pub async fn register_admin(&self, credentials: &Credentials) -> Result<User, UserError> {
        self.create(credentials, true).await
    }

    async fn create(&self, credentials: &Credentials, is_admin: bool) -> Result<User, UserError> {
        let email = validate(credentials)?;

        let password = credentials.password.clone();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| UserError::Hashing(err.to_string()))?
            .map_err(|err| UserError::Hashing(err.to_string()))?;

        let user = self.store.create(&email, &hash, is_admin).await?;
        tracing::info!(user_id = user.id, is_admin, "registered user");
        Ok(user)
    }

    /// Check credentials and return the caller's identity.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, UserError> {
        let email = validate(credentials)?;

        let Some(record) = self.store.find_by_email(&email).await? else {
            return Err(UserError::InvalidCredentials);
        };

        let password = credentials.password.clone();
        let hash = record.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|err| UserError::Hashing(err.to_string()))?
            .map_err(|err| UserError::Hashing(err.to_string()))?;

        if !matches {
            tracing::debug!(user_id = record.id, "password mismatch");
            return Err(UserError::InvalidCredentials);
        }

        Ok(record.into_user().identity())
    }

    pub async fn get(&self, id: i64) -> Result<User, UserError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }
}

/// Normalize the email and reject empty fields.
fn validate(credentials: &Credentials) -> Result<String, UserError> {
    let email = credentials.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(UserError::MissingEmail);
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(UserError::InvalidEmail);
    }
    if credentials.password.is_empty() {
        return Err(UserError::MissingPassword);
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::users::memory::InMemoryUserStore;

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let users = UserService::new(Arc::new(InMemoryUserStore::new()));
        let user = users.register(&creds("Reader@Example.com ", "pw")).await.unwrap();
        assert_eq!(user.email, "reader@example.com");
        assert!(!user.is_admin);

        let identity = users.authenticate(&creds("reader@example.com", "pw")).await.unwrap();
        assert_eq!(identity.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let users = UserService::new(Arc::new(InMemoryUserStore::new()));
        users.register(&creds("a@example.com", "pw")).await.unwrap();

        let wrong = users.authenticate(&creds("a@example.com", "nope")).await.unwrap_err();
        let unknown = users.authenticate(&creds("b@example.com", "pw")).await.unwrap_err();
        assert!(matches!(wrong, UserError::InvalidCredentials));
        assert!(matches!(unknown, UserError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let users = UserService::new(Arc::new(InMemoryUserStore::new()));
        users.register(&creds("a@example.com", "pw")).await.unwrap();
        let err = users.register(&creds("A@example.com", "pw2")).await.unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn empty_fields_are_rejected_before_hashing() {
        let users = UserService::new(Arc::new(InMemoryUserStore::new()));
        assert!(matches!(
            users.register(&creds("", "pw")).await.unwrap_err(),
            UserError::MissingEmail
        ));
        assert!(matches!(
            users.register(&creds("nobody", "pw")).await.unwrap_err(),
            UserError::InvalidEmail
        ));
        assert!(matches!(
            users.register(&creds("a@example.com", "")).await.unwrap_err(),
            UserError::MissingPassword
        ));
    }

    #[tokio::test]
    async fn admin_identity_carries_the_flag() {
        let users = UserService::new(Arc::new(InMemoryUserStore::new()));
        users.register_admin(&creds("root@example.com", "pw")).await.unwrap();
        let identity = users.authenticate(&creds("root@example.com", "pw")).await.unwrap();
        assert!(identity.is_admin);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let users = UserService::new(Arc::new(InMemoryUserStore::new()));
        assert!(matches!(users.get(99).await.unwrap_err(), UserError::NotFound(99)));
    }
}

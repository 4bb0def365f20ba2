//! Cart/inventory engine.
//!
//! Adding books to a cart reserves stock: each requested book must have at
//! least one unit left, every one of them is decremented by exactly one and
//! the ids are merged into the cart, all in a single store transaction.
//! Correctness under concurrency comes from the store's row locks, not from
//! anything held in this process.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;

use bookstore_db::DbError;
use bookstore_http::AppError;
use bookstore_kernel::settings::CartSettings;

use super::models::Cart;
use super::store::CartStore;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("at least one book id is required")]
    EmptyRequest,

    #[error("book id {0} is not valid")]
    InvalidBookId(i64),

    #[error("book {book_id} is out of stock")]
    OutOfStock { book_id: i64 },

    /// Nothing was committed before the deadline.
    #[error("cart operation did not finish in time")]
    DeadlineExceeded,

    /// The connection failed while committing; the reservation may or may
    /// not have been applied. Check the cart before trying again.
    #[error("reservation outcome unknown: {0}")]
    OutcomeUnknown(String),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        CartError::Store(DbError::from(err))
    }
}

impl CartError {
    /// Whether repeating the whole request may succeed unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            CartError::DeadlineExceeded => true,
            CartError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        let message = err.to_string();
        match err {
            CartError::EmptyRequest => AppError::invalid_field("book_ids", "required"),
            CartError::InvalidBookId(id) => AppError::validation(
                vec![json!({ "field": "book_ids", "error": "invalid", "book_id": id })],
                message,
            ),
            CartError::OutOfStock { book_id } => {
                AppError::conflict(vec![json!({ "book_id": book_id })], message)
                    .with_code("out_of_stock")
            }
            CartError::DeadlineExceeded => {
                AppError::unavailable(message).with_code("deadline_exceeded")
            }
            CartError::OutcomeUnknown(_) => AppError::Internal(anyhow::anyhow!(message)),
            CartError::Store(db) => db.into(),
        }
    }
}

/// Timing policy for the engine.
#[derive(Debug, Clone, Copy)]
pub struct CartPolicy {
    pub idle_threshold: Duration,
    pub operation_timeout: Duration,
    pub sweep_timeout: Duration,
}

impl CartPolicy {
    pub fn from_settings(settings: &CartSettings) -> Self {
        Self {
            idle_threshold: settings.idle_threshold(),
            operation_timeout: settings.operation_timeout(),
            sweep_timeout: settings.sweep_timeout(),
        }
    }
}

impl Default for CartPolicy {
    fn default() -> Self {
        Self::from_settings(&CartSettings::default())
    }
}

pub struct CartService {
    store: Arc<dyn CartStore>,
    policy: CartPolicy,
}

impl CartService {
    pub fn new(store: Arc<dyn CartStore>, policy: CartPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &CartPolicy {
        &self.policy
    }

    /// Reserve one unit of each book and merge the ids into the user's cart.
    ///
    /// All or nothing: an out-of-stock book, a store failure or the deadline
    /// expiring leaves stock and cart exactly as they were. The deadline is
    /// handed to the store, which enforces it up to the commit point only; a
    /// reservation that reached COMMIT is never reported as timed out. Only
    /// `OutcomeUnknown` may hide an applied reservation. Repeated ids in one
    /// request count once.
    pub async fn add_books(&self, user_id: i64, book_ids: Vec<i64>) -> Result<Cart, CartError> {
        if book_ids.is_empty() {
            return Err(CartError::EmptyRequest);
        }
        if let Some(&bad) = book_ids.iter().find(|&&id| id <= 0) {
            return Err(CartError::InvalidBookId(bad));
        }
        let requested: Vec<i64> = book_ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();

        let outcome = self
            .store
            .reserve_and_add(user_id, &requested, self.policy.operation_timeout)
            .await;

        match &outcome {
            Ok(cart) => tracing::info!(
                user_id,
                reserved = ?requested,
                cart_size = cart.book_ids.len(),
                "reserved books into cart"
            ),
            Err(CartError::OutOfStock { book_id }) => {
                tracing::info!(user_id, book_id, "reservation refused: out of stock")
            }
            Err(err @ CartError::OutcomeUnknown(_)) => {
                tracing::error!(user_id, reserved = ?requested, error = %err, "reservation outcome unknown")
            }
            Err(err) => tracing::warn!(user_id, error = %err, "reservation failed"),
        }
        outcome
    }

    /// The user's current cart, empty if none exists.
    pub async fn cart(&self, user_id: i64) -> Result<Cart, CartError> {
        let cart = self.store.find(user_id).await?;
        Ok(cart.unwrap_or_else(|| Cart::empty(user_id)))
    }

    /// One sweep pass: clear carts idle past the threshold.
    pub async fn cleanup_expired(&self) -> Result<u64, CartError> {
        let cleared = tokio::time::timeout(
            self.policy.sweep_timeout,
            self.store.delete_idle(self.policy.idle_threshold),
        )
        .await
        .map_err(|_| CartError::DeadlineExceeded)??;

        if cleared > 0 {
            tracing::debug!(cleared, "swept idle carts");
        }
        Ok(cleared)
    }
}

//! Cart persistence and the locking reservation transaction.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use bookstore_db::{Database, DbError};

use super::models::Cart;
use super::service::CartError;

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Reserve one unit of every book in `book_ids` and merge them into the
    /// user's cart as one unit of work.
    ///
    /// `book_ids` is non-empty, sorted and duplicate-free. `deadline` bounds
    /// the work up to the commit point and never the commit itself. On any
    /// error other than `CartError::OutcomeUnknown` no stock and no cart row
    /// has changed.
    async fn reserve_and_add(
        &self,
        user_id: i64,
        book_ids: &[i64],
        deadline: Duration,
    ) -> Result<Cart, CartError>;

    async fn find(&self, user_id: i64) -> Result<Option<Cart>, DbError>;

    /// Clear every cart untouched for longer than `idle_for`; returns how
    /// many were cleared. Reserved stock is not given back.
    async fn delete_idle(&self, idle_for: Duration) -> Result<u64, DbError>;
}

/// A server-reported commit failure means the transaction was rolled back.
/// Anything else (a dropped connection, a protocol error) leaves the outcome
/// unknown.
fn commit_error(err: sqlx::Error) -> CartError {
    match err {
        sqlx::Error::Database(_) => CartError::Store(DbError::from(err)),
        other => CartError::OutcomeUnknown(other.to_string()),
    }
}

pub struct PgCartStore {
    db: Database,
}

impl PgCartStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn reserve_and_add(
        &self,
        user_id: i64,
        book_ids: &[i64],
        deadline: Duration,
    ) -> Result<Cart, CartError> {
        let reserve = async {
            let mut tx = self.db.begin().await?;

            // The server gives up on its own once the deadline has passed,
            // so a lock wait cannot outlive the client.
            let deadline_ms = format!("{}ms", deadline.as_millis().max(1));
            sqlx::query("SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $1, true)")
                .bind(&deadline_ms)
                .execute(&mut *tx)
                .await?;

            // Locks are taken in ascending id order so overlapping requests
            // queue behind each other instead of deadlocking.
            let locked: Vec<(i64, i32)> = sqlx::query_as(
                "SELECT id, amount FROM books WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            )
            .bind(book_ids)
            .fetch_all(&mut *tx)
            .await?;
            let stock: HashMap<i64, i32> = locked.into_iter().collect();

            for &book_id in book_ids {
                match stock.get(&book_id) {
                    Some(&amount) if amount > 0 => {}
                    _ => return Err(CartError::OutOfStock { book_id }),
                }
            }

            sqlx::query("UPDATE books SET amount = amount - 1, updated_at = NOW() WHERE id = ANY($1)")
                .bind(book_ids)
                .execute(&mut *tx)
                .await?;

            let cart = sqlx::query_as::<_, Cart>(
                r#"
                INSERT INTO carts (user_id, book_ids, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (user_id) DO UPDATE
                SET book_ids = ARRAY(
                        SELECT DISTINCT unnest(carts.book_ids || EXCLUDED.book_ids) ORDER BY 1
                    ),
                    updated_at = NOW()
                RETURNING user_id, book_ids, updated_at
                "#,
            )
            .bind(user_id)
            .bind(book_ids)
            .fetch_one(&mut *tx)
            .await?;

            Ok::<_, CartError>((tx, cart))
        };

        // Dropping `reserve` on timeout drops the open transaction, which
        // rolls back. Nothing has been committed at that point.
        let (tx, cart) = tokio::time::timeout(deadline, reserve)
            .await
            .map_err(|_| CartError::DeadlineExceeded)??;

        // COMMIT is never cut short: once it is sent the reservation may
        // already be durable.
        tx.commit().await.map_err(commit_error)?;
        Ok(cart)
    }

    async fn find(&self, user_id: i64) -> Result<Option<Cart>, DbError> {
        let cart = sqlx::query_as::<_, Cart>(
            "SELECT user_id, book_ids, updated_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(cart)
    }

    async fn delete_idle(&self, idle_for: Duration) -> Result<u64, DbError> {
        let idle_secs = i64::try_from(idle_for.as_secs()).unwrap_or(i64::MAX);

        let mut tx = self.db.begin().await?;
        let result = sqlx::query(
            "DELETE FROM carts WHERE updated_at < NOW() - ($1::bigint * INTERVAL '1 second')",
        )
        .bind(idle_secs)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }
}

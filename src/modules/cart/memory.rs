use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use bookstore_db::DbError;

use super::models::Cart;
use super::service::CartError;
use super::store::CartStore;

#[derive(Default)]
struct State {
    stock: HashMap<i64, i32>,
    carts: HashMap<i64, Cart>,
}

/// Cart store kept in process memory.
///
/// One async mutex guards stock and carts together, standing in for the row
/// locks the Postgres store takes: reservations are serialized and a failed
/// one leaves no trace.
#[derive(Default)]
pub struct InMemoryCartStore {
    state: Mutex<State>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stock(stock: impl IntoIterator<Item = (i64, i32)>) -> Self {
        Self {
            state: Mutex::new(State {
                stock: stock.into_iter().collect(),
                carts: HashMap::new(),
            }),
        }
    }

    pub async fn set_stock(&self, book_id: i64, amount: i32) {
        self.state.lock().await.stock.insert(book_id, amount);
    }

    pub async fn stock(&self, book_id: i64) -> Option<i32> {
        self.state.lock().await.stock.get(&book_id).copied()
    }

    /// Move a cart's idle clock into the past.
    pub async fn backdate(&self, user_id: i64, by: Duration) {
        let mut state = self.state.lock().await;
        if let Some(cart) = state.carts.get_mut(&user_id) {
            let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
            cart.updated_at = cart.updated_at.map(|at| at - by);
        }
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn reserve_and_add(
        &self,
        user_id: i64,
        book_ids: &[i64],
        deadline: Duration,
    ) -> Result<Cart, CartError> {
        // Waiting for the lock is the only part that can time out; once it is
        // held the reservation runs to completion.
        let mut state = tokio::time::timeout(deadline, self.state.lock())
            .await
            .map_err(|_| CartError::DeadlineExceeded)?;

        for &book_id in book_ids {
            match state.stock.get(&book_id) {
                Some(&amount) if amount > 0 => {}
                _ => return Err(CartError::OutOfStock { book_id }),
            }
        }

        // Give other reservers a chance to run while the lock is held.
        tokio::task::yield_now().await;

        for book_id in book_ids {
            if let Some(amount) = state.stock.get_mut(book_id) {
                *amount -= 1;
            }
        }

        let cart = state
            .carts
            .entry(user_id)
            .or_insert_with(|| Cart::empty(user_id));
        let merged: BTreeSet<i64> = cart.book_ids.iter().chain(book_ids).copied().collect();
        cart.book_ids = merged.into_iter().collect();
        cart.updated_at = Some(Utc::now());

        Ok(cart.clone())
    }

    async fn find(&self, user_id: i64) -> Result<Option<Cart>, DbError> {
        Ok(self.state.lock().await.carts.get(&user_id).cloned())
    }

    async fn delete_idle(&self, idle_for: Duration) -> Result<u64, DbError> {
        let idle_for = chrono::Duration::from_std(idle_for).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(idle_for);

        let mut state = self.state.lock().await;
        let before = state.carts.len();
        if let Some(cutoff) = cutoff {
            state
                .carts
                .retain(|_, cart| cart.updated_at.is_some_and(|at| at >= cutoff));
        }
        Ok((before - state.carts.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLINE: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn lock_wait_past_the_deadline_changes_nothing() {
        let store = InMemoryCartStore::with_stock([(1, 2)]);
        let held = store.state.lock().await;

        let err = store.reserve_and_add(7, &[1], DEADLINE).await.unwrap_err();
        assert!(matches!(err, CartError::DeadlineExceeded));
        drop(held);

        assert_eq!(store.stock(1).await, Some(2));
        assert!(store.find(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reservation_under_the_deadline_applies() {
        let store = InMemoryCartStore::with_stock([(1, 2)]);
        let cart = store.reserve_and_add(7, &[1], DEADLINE).await.unwrap();
        assert_eq!(cart.book_ids, vec![1]);
        assert_eq!(store.stock(1).await, Some(1));
    }
}

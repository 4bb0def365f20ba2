//! Reservation and sweep behavior of the cart engine over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use bookstore_app::modules::cart::memory::InMemoryCartStore;
use bookstore_app::modules::cart::{CartError, CartPolicy, CartService};

fn engine(stock: &[(i64, i32)]) -> (Arc<CartService>, Arc<InMemoryCartStore>) {
    let store = Arc::new(InMemoryCartStore::with_stock(stock.iter().copied()));
    let service = Arc::new(CartService::new(store.clone(), CartPolicy::default()));
    (service, store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_never_oversubscribe() {
    const STOCK: i32 = 5;
    const BUYERS: i64 = 40;
    let (carts, store) = engine(&[(1, STOCK)]);

    let mut handles = Vec::new();
    for user_id in 1..=BUYERS {
        let carts = Arc::clone(&carts);
        handles.push(tokio::spawn(async move { carts.add_books(user_id, vec![1]).await }));
    }

    let mut succeeded = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(cart) => {
                assert!(cart.contains(1));
                succeeded += 1;
            }
            Err(CartError::OutOfStock { book_id }) => {
                assert_eq!(book_id, 1);
                refused += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, STOCK);
    assert_eq!(refused, BUYERS as i32 - STOCK);
    assert_eq!(store.stock(1).await, Some(0));
}

#[tokio::test]
async fn last_unit_goes_to_exactly_one_of_two_racers() {
    let (carts, store) = engine(&[(9, 1)]);
    let (a, b) = tokio::join!(carts.add_books(1, vec![9]), carts.add_books(2, vec![9]));

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    assert_eq!(store.stock(9).await, Some(0));
}

#[tokio::test]
async fn one_missing_book_aborts_the_whole_request() {
    let (carts, store) = engine(&[(1, 3), (2, 0), (3, 3)]);

    let err = carts.add_books(7, vec![1, 2, 3]).await.unwrap_err();
    assert!(matches!(err, CartError::OutOfStock { book_id: 2 }));

    assert_eq!(store.stock(1).await, Some(3));
    assert_eq!(store.stock(3).await, Some(3));
    assert!(carts.cart(7).await.unwrap().book_ids.is_empty());

    let err = carts.add_books(7, vec![1, 404]).await.unwrap_err();
    assert!(matches!(err, CartError::OutOfStock { book_id: 404 }));
    assert_eq!(store.stock(1).await, Some(3));
}

#[tokio::test]
async fn adding_twice_keeps_one_entry_and_decrements_twice() {
    let (carts, store) = engine(&[(1, 5), (2, 5)]);

    carts.add_books(7, vec![2, 1]).await.unwrap();
    let cart = carts.add_books(7, vec![1]).await.unwrap();

    assert_eq!(cart.book_ids, vec![1, 2]);
    assert_eq!(store.stock(1).await, Some(3));
    assert_eq!(store.stock(2).await, Some(4));
}

#[tokio::test]
async fn repeated_ids_in_one_request_reserve_once() {
    let (carts, store) = engine(&[(1, 5)]);
    let cart = carts.add_books(7, vec![1, 1, 1]).await.unwrap();
    assert_eq!(cart.book_ids, vec![1]);
    assert_eq!(store.stock(1).await, Some(4));
}

#[tokio::test]
async fn empty_and_non_positive_ids_are_rejected_up_front() {
    let (carts, store) = engine(&[(1, 5)]);
    assert!(matches!(carts.add_books(7, vec![]).await.unwrap_err(), CartError::EmptyRequest));
    assert!(matches!(
        carts.add_books(7, vec![1, -3]).await.unwrap_err(),
        CartError::InvalidBookId(-3)
    ));
    assert_eq!(store.stock(1).await, Some(5));
}

#[tokio::test]
async fn sweep_respects_the_idle_threshold() {
    let (carts, store) = engine(&[(1, 5), (2, 5)]);
    carts.add_books(7, vec![1, 2]).await.unwrap();
    carts.add_books(8, vec![1]).await.unwrap();

    store.backdate(7, Duration::from_secs(31 * 60)).await;
    store.backdate(8, Duration::from_secs(29 * 60)).await;

    assert_eq!(carts.cleanup_expired().await.unwrap(), 1);
    assert!(carts.cart(7).await.unwrap().book_ids.is_empty());
    assert_eq!(carts.cart(8).await.unwrap().book_ids, vec![1]);

    // Stock stays reserved after the sweep.
    assert_eq!(store.stock(1).await, Some(3));
    assert_eq!(store.stock(2).await, Some(4));
}

#[tokio::test]
async fn adding_refreshes_the_idle_clock() {
    let (carts, store) = engine(&[(1, 5), (2, 5)]);
    carts.add_books(7, vec![1]).await.unwrap();
    store.backdate(7, Duration::from_secs(31 * 60)).await;

    carts.add_books(7, vec![2]).await.unwrap();
    assert_eq!(carts.cleanup_expired().await.unwrap(), 0);
    assert_eq!(carts.cart(7).await.unwrap().book_ids, vec![1, 2]);
}

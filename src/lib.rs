//! Bookstore application library
//!
//! Catalog, accounts and carts with stock reservation, assembled from
//! modules mounted on the shared HTTP stack.

pub mod app;
pub mod modules;
pub mod utils;

pub use app::Services;

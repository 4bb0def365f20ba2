pub mod auth;
pub mod books;
pub mod cart;
pub mod categories;
pub mod users;

use bookstore_kernel::ModuleRegistry;

use crate::app::Services;

/// Register every module with the registry. Accounts and tokens are core
/// modules; the catalog and cart build on them.
pub fn register_all(registry: &mut ModuleRegistry, services: &Services) {
    registry.register_core(users::create_module(services.clone()));
    registry.register_core(auth::create_module(services.clone()));

    registry.register_custom(categories::create_module(services.clone()));
    registry.register_custom(books::create_module(services.clone()));
    registry.register_custom(cart::create_module(services.clone()));
}

//! Application wiring: shared services, module registration and the
//! process lifecycle used by the binaries.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;

use bookstore_db::{apply_migrations, Database};
use bookstore_kernel::settings::Settings;
use bookstore_kernel::{InitCtx, ModuleRegistry};

use crate::modules;
use crate::modules::auth::store::{PgTokenStore, TokenStore};
use crate::modules::auth::{TokenConfig, TokenService};
use crate::modules::books::store::{BookStore, PgBookStore};
use crate::modules::books::BookService;
use crate::modules::cart::store::{CartStore, PgCartStore};
use crate::modules::cart::{CartPolicy, CartService};
use crate::modules::categories::store::{CategoryStore, PgCategoryStore};
use crate::modules::categories::CategoryService;
use crate::modules::users::models::Credentials;
use crate::modules::users::store::{PgUserStore, UserStore};
use crate::modules::users::UserService;

/// Services shared by every module and handed to handlers as router state.
#[derive(Clone)]
pub struct Services {
    pub users: Arc<UserService>,
    pub tokens: Arc<TokenService>,
    pub carts: Arc<CartService>,
    pub books: Arc<BookService>,
    pub categories: Arc<CategoryService>,
}

impl FromRef<Services> for Arc<TokenService> {
    fn from_ref(services: &Services) -> Self {
        Arc::clone(&services.tokens)
    }
}

impl Services {
    /// Postgres-backed services sharing one connection pool.
    pub fn new(db: &Database, settings: &Settings) -> Self {
        Self::with_stores(
            settings,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgTokenStore::new(db.clone())),
            Arc::new(PgCartStore::new(db.clone())),
            Arc::new(PgBookStore::new(db.clone())),
            Arc::new(PgCategoryStore::new(db.clone())),
        )
    }

    pub fn with_stores(
        settings: &Settings,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        carts: Arc<dyn CartStore>,
        books: Arc<dyn BookStore>,
        categories: Arc<dyn CategoryStore>,
    ) -> Self {
        Self {
            users: Arc::new(UserService::new(users)),
            tokens: Arc::new(TokenService::new(TokenConfig::from_settings(&settings.auth), tokens)),
            carts: Arc::new(CartService::new(carts, CartPolicy::from_settings(&settings.cart))),
            books: Arc::new(BookService::new(books)),
            categories: Arc::new(CategoryService::new(categories)),
        }
    }
}

pub fn build_registry(services: &Services) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, services);
    registry
}

async fn connect(settings: &Settings) -> anyhow::Result<Database> {
    let db = Database::connect(&settings.database.to_config())
        .await
        .context("failed to connect to the database")?;
    Ok(db)
}

async fn migrate_registry(registry: &ModuleRegistry, db: &Database) -> anyhow::Result<usize> {
    let migrations = registry.collect_migrations();
    let applied = apply_migrations(db, &migrations)
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, total = migrations.len(), "migrations up to date");
    Ok(applied)
}

/// Load settings and install the tracing subscriber.
pub fn bootstrap() -> anyhow::Result<Settings> {
    let settings = Settings::load().context("failed to load bookstore settings")?;
    bookstore_telemetry::init(&settings.telemetry)?;
    tracing::info!(env = ?settings.environment, "bookstore bootstrap complete");
    Ok(settings)
}

/// Serve the API until interrupted.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let db = connect(&settings).await?;
    let services = Services::new(&db, &settings);
    let registry = build_registry(&services);

    if settings.database.run_migrations {
        migrate_registry(&registry, &db).await?;
    }

    let ctx = InitCtx {
        settings: &settings,
        db: &db,
    };
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served = bookstore_http::start_server(&registry, &settings, shutdown_signal()).await;

    let stopped = registry.stop_all().await;
    db.close().await;
    tracing::info!("bookstore stopped");

    served?;
    stopped
}

/// Apply pending migrations and exit.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let db = connect(settings).await?;
    let services = Services::new(&db, settings);
    let registry = build_registry(&services);
    let applied = migrate_registry(&registry, &db).await;
    db.close().await;
    applied
}

/// Create an administrator account. There is no HTTP route for this.
pub async fn create_admin(settings: &Settings, email: &str, password: &str) -> anyhow::Result<i64> {
    let db = connect(settings).await?;
    let services = Services::new(&db, settings);
    let credentials = Credentials {
        email: email.to_string(),
        password: password.to_string(),
    };
    let created = services.users.register_admin(&credentials).await;
    db.close().await;
    let user = created.context("failed to create admin")?;
    Ok(user.id)
}

/// Counts removed by a single pass of both sweepers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub tokens: u64,
    pub carts: u64,
}

/// Run the token and cart sweeps once, outside the server.
pub async fn run_sweeps_once(settings: &Settings) -> anyhow::Result<SweepReport> {
    let db = connect(settings).await?;
    let services = Services::new(&db, settings);
    let report = sweep(&services).await;
    db.close().await;
    report
}

pub async fn sweep(services: &Services) -> anyhow::Result<SweepReport> {
    let tokens = services
        .tokens
        .cleanup_expired()
        .await
        .context("token sweep failed")?;
    let carts = services
        .carts
        .cleanup_expired()
        .await
        .context("cart sweep failed")?;
    tracing::info!(tokens, carts, "sweep complete");
    Ok(SweepReport { tokens, carts })
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(any(test, feature = "test-utils"))]
impl Services {
    /// Services over in-memory stores. The cart store is returned so callers
    /// can seed stock.
    pub fn in_memory(
        settings: &Settings,
    ) -> (Self, Arc<crate::modules::cart::memory::InMemoryCartStore>) {
        let carts = Arc::new(crate::modules::cart::memory::InMemoryCartStore::new());
        let services = Self::with_stores(
            settings,
            Arc::new(crate::modules::users::memory::InMemoryUserStore::new()),
            Arc::new(crate::modules::auth::memory::InMemoryTokenStore::new()),
            carts.clone(),
            Arc::new(crate::modules::books::store::InMemoryBookStore::new()),
            Arc::new(crate::modules::categories::store::InMemoryCategoryStore::new()),
        );
        (services, carts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_every_module_with_ordered_migrations() {
        let (services, _) = Services::in_memory(&Settings::default());
        let registry = build_registry(&services);

        assert_eq!(registry.core_module_count(), 2);
        assert_eq!(registry.custom_module_count(), 3);
        for name in ["users", "auth", "categories", "books", "cart"] {
            assert!(registry.get_module(name).is_some(), "missing module {name}");
        }

        let ids: Vec<_> = registry
            .collect_migrations()
            .into_iter()
            .map(|(_, migration)| migration.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                "0001_create_users",
                "0002_create_categories",
                "0003_create_books",
                "0004_create_user_tokens",
                "0005_create_carts",
            ]
        );
    }

    #[tokio::test]
    async fn sweep_on_empty_stores_removes_nothing() {
        let (services, _) = Services::in_memory(&Settings::default());
        let report = sweep(&services).await.unwrap();
        assert_eq!(report, SweepReport { tokens: 0, carts: 0 });
    }
}

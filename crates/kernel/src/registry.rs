use anyhow::Context;
use std::sync::Arc;

use crate::module::{InitCtx, Module};

/// Core module initialization order. Every other module depends on identity
/// and token validation, so these come first and stop last.
const CORE_MODULE_ORDER: &[&str] = &["users", "auth"];

/// Module registry for managing module lifecycle with core/custom separation
pub struct ModuleRegistry {
    core_modules: Vec<Arc<dyn Module>>,
    custom_modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            core_modules: Vec::new(),
            custom_modules: Vec::new(),
        }
    }

    /// Register a core module with the registry
    pub fn register_core(&mut self, module: Arc<dyn Module>) {
        self.core_modules.push(module);
    }

    /// Register a custom module with the registry
    pub fn register_custom(&mut self, module: Arc<dyn Module>) {
        self.custom_modules.push(module);
    }

    /// Get all registered modules (core + custom)
    pub fn modules(&self) -> Vec<&Arc<dyn Module>> {
        let mut all_modules = Vec::new();
        all_modules.extend(self.core_modules.iter());
        all_modules.extend(self.custom_modules.iter());
        all_modules
    }

    /// Get a module by name (searches both core and custom modules)
    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.core_modules
            .iter()
            .chain(self.custom_modules.iter())
            .find(|module| module.name() == name)
    }

    pub fn core_module_count(&self) -> usize {
        self.core_modules.len()
    }

    pub fn custom_module_count(&self) -> usize {
        self.custom_modules.len()
    }

    fn ordered_core_modules(&self) -> impl DoubleEndedIterator<Item = &Arc<dyn Module>> {
        CORE_MODULE_ORDER.iter().filter_map(|&name| {
            self.core_modules
                .iter()
                .find(|module| module.name() == name)
        })
    }

    /// Initialize every module: core modules in order, then custom modules
    pub async fn init_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!("initializing core modules in order: {:?}", CORE_MODULE_ORDER);
        for module in self.ordered_core_modules() {
            tracing::info!(module = module.name(), "initializing core module");
            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize core module '{}'", module.name()))?;
        }

        tracing::info!("initializing {} custom modules", self.custom_modules.len());
        for module in &self.custom_modules {
            tracing::info!(module = module.name(), "initializing custom module");
            module.init(ctx).await.with_context(|| {
                format!("failed to initialize custom module '{}'", module.name())
            })?;
        }

        Ok(())
    }

    /// Start background work: core modules in order, then custom modules
    pub async fn start_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in self.ordered_core_modules() {
            tracing::info!(module = module.name(), "starting core module");
            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start core module '{}'", module.name()))?;
        }

        for module in &self.custom_modules {
            tracing::info!(module = module.name(), "starting custom module");
            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start custom module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop custom modules in reverse order, then core modules in reverse order.
    ///
    /// Every module gets a stop call even if an earlier one fails; the first
    /// failure is returned.
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        let mut first_error = None;

        let custom = self.custom_modules.iter().rev();
        let core = self.ordered_core_modules().rev();
        for module in custom.chain(core) {
            tracing::info!(module = module.name(), "stopping module");
            if let Err(err) = module.stop().await {
                tracing::error!(module = module.name(), error = %err, "module failed to stop");
                first_error.get_or_insert_with(|| {
                    err.context(format!("failed to stop module '{}'", module.name()))
                });
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Collect all migrations from all modules, ordered by migration id.
    pub fn collect_migrations(&self) -> Vec<(String, crate::Migration)> {
        let mut migrations: Vec<(String, crate::Migration)> = self
            .modules()
            .into_iter()
            .flat_map(|module| {
                module
                    .migrations()
                    .into_iter()
                    .map(|migration| (module.name().to_string(), migration))
            })
            .collect();

        // Tables reference each other across modules, so the id decides order.
        migrations.sort_by(|a, b| a.1.id.cmp(b.1.id).then_with(|| a.0.cmp(&b.0)));

        migrations
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::Migration;
    use bookstore_db::{Database, DatabaseConfig};
    use std::sync::Mutex;

    struct TestModule {
        name: &'static str,
        migration_id: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
        fail_stop: bool,
    }

    impl TestModule {
        fn new(name: &'static str, migration_id: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                migration_id,
                journal: Arc::clone(journal),
                fail_stop: false,
            }
        }

        fn record(&self, event: &str) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{}", event, self.name));
        }
    }

    #[async_trait::async_trait]
    impl Module for TestModule {
        fn name(&self) -> &'static str {
            self.name
        }

        fn migrations(&self) -> Vec<Migration> {
            vec![Migration {
                id: self.migration_id,
                up: "SELECT 1;",
            }]
        }

        async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.record("init");
            Ok(())
        }

        async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.record("start");
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.record("stop");
            if self.fail_stop {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    fn lazy_db() -> Database {
        Database::connect_lazy(&DatabaseConfig::new("postgres://localhost/bookstore_test")).unwrap()
    }

    #[test]
    fn test_module_registry_creation() {
        let registry = ModuleRegistry::new();
        assert!(registry.modules().is_empty());
        assert!(registry.collect_migrations().is_empty());
    }

    #[test]
    fn migrations_are_ordered_by_id_across_modules() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_custom(Arc::new(TestModule::new("books", "0003_books", &journal)));
        registry.register_core(Arc::new(TestModule::new("users", "0001_users", &journal)));
        registry.register_custom(Arc::new(TestModule::new("categories", "0002_categories", &journal)));

        let ids: Vec<_> = registry
            .collect_migrations()
            .into_iter()
            .map(|(module, migration)| format!("{module}/{}", migration.id))
            .collect();
        assert_eq!(
            ids,
            vec!["users/0001_users", "categories/0002_categories", "books/0003_books"]
        );
    }

    #[test]
    fn get_module_searches_core_and_custom() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_core(Arc::new(TestModule::new("auth", "0001", &journal)));
        registry.register_custom(Arc::new(TestModule::new("cart", "0002", &journal)));

        assert!(registry.get_module("auth").is_some());
        assert!(registry.get_module("cart").is_some());
        assert!(registry.get_module("missing").is_none());
        assert_eq!(registry.core_module_count(), 1);
        assert_eq!(registry.custom_module_count(), 1);
    }

    #[tokio::test]
    async fn test_module_lifecycle_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_core(Arc::new(TestModule::new("auth", "0002", &journal)));
        registry.register_core(Arc::new(TestModule::new("users", "0001", &journal)));
        registry.register_custom(Arc::new(TestModule::new("cart", "0005", &journal)));

        let settings = Settings::default();
        let db = lazy_db();
        let ctx = InitCtx {
            settings: &settings,
            db: &db,
        };

        registry.init_all(&ctx).await.unwrap();
        registry.start_all(&ctx).await.unwrap();
        registry.stop_all().await.unwrap();

        let events = journal.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "init:users",
                "init:auth",
                "init:cart",
                "start:users",
                "start:auth",
                "start:cart",
                "stop:cart",
                "stop:auth",
                "stop:users",
            ]
        );
    }

    #[tokio::test]
    async fn stop_all_continues_past_failures() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_core(Arc::new(TestModule::new("auth", "0002", &journal)));
        let mut failing = TestModule::new("cart", "0005", &journal);
        failing.fail_stop = true;
        registry.register_custom(Arc::new(failing));

        let err = registry.stop_all().await.unwrap_err();
        assert!(err.to_string().contains("cart"));

        let events = journal.lock().unwrap().clone();
        assert_eq!(events, vec!["stop:cart", "stop:auth"]);
    }
}

//! Core traits, settings, module registry and background tasks.

pub mod module;
pub mod registry;
pub mod settings;
pub mod task;

pub use bookstore_db::Migration;
pub use module::{InitCtx, Module};
pub use registry::ModuleRegistry;
pub use task::PeriodicTask;

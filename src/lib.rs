pub mod admin;
pub mod clock;
pub mod config;
pub mod container;
pub mod errors;
pub mod locator;
pub mod logging;
pub mod modules;
pub mod registry;
pub mod scope;

// Re-export commonly used items for convenience
pub use config::AppConfig;
pub use errors::{AppError, RegistryError};
pub use locator::ServiceLocator;
pub use registry::{RegistryCache, UnitOfWork};

pub mod app_config;
pub mod loader;
pub mod logging_config;
pub mod registry_config;

// Re-export commonly used types
pub use app_config::AppConfig;
pub use loader::ConfigLoader;
pub use logging_config::LoggingSettings;
pub use registry_config::RegistrySettings;

// Re-export constants
pub use app_config::{CONFIG_FILE_NAME, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_REFRESH_PERIOD_SECS};

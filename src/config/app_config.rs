use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf};
use crate::errors::ConfigError;

use super::{
    loader::ConfigLoader,
    logging_config::{LoggingSettings, PartialLoggingSettings},
    registry_config::{PartialRegistrySettings, RegistrySettings},
};

// Configuration file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "scopecache.toml";

// Environment overrides
pub const ENV_REFRESH_PERIOD_SECS: &str = "SCOPECACHE_REFRESH_PERIOD_SECS";
pub const ENV_LOG_LEVEL: &str = "SCOPECACHE_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "SCOPECACHE_LOG_FORMAT";

/// Main Application Configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub registry: RegistrySettings,
    pub logging: LoggingSettings,
}

/// Partial Application Configuration for loading from files
#[derive(Deserialize, Debug, Default)]
pub struct PartialAppConfig {
    registry: Option<PartialRegistrySettings>,
    logging: Option<PartialLoggingSettings>,
}

impl AppConfig {
    /// Load configuration from the default file and environment
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load_config()
    }

    /// Load configuration from an explicit file (must exist)
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        ConfigLoader::with_path(path).load_config()
    }

    /// Create AppConfig from partial config and environment
    pub fn from_partial_and_env(
        partial: Option<PartialAppConfig>,
        env_map: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();

        let registry = RegistrySettings::from_env_or_file(partial.registry, &env_map)?;
        let logging = LoggingSettings::from_env_or_file(partial.logging, &env_map)?;

        Ok(AppConfig { registry, logging })
    }
}

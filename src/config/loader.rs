use std::{collections::HashMap, env, fs, path::PathBuf};
use crate::errors::ConfigError;

use super::app_config::{
    AppConfig, PartialAppConfig, CONFIG_FILE_NAME, ENV_LOG_FORMAT, ENV_LOG_LEVEL,
    ENV_REFRESH_PERIOD_SECS,
};

/// Configuration loader responsible for loading config from files and environment
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that reads `scopecache.toml` from the working directory if present
    pub fn new() -> Self {
        Self { path: None }
    }

    /// Create a loader for an explicit file; a missing file is an error
    pub fn with_path(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Load complete application configuration
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let partial_config = self.load_partial_config()?;
        let env_map = self.collect_env_vars();
        let config = AppConfig::from_partial_and_env(partial_config, env_map)?;

        tracing::debug!(
            refresh_period_secs = config.registry.refresh_period.as_secs(),
            log_level = %config.logging.level,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load partial configuration from TOML file
    fn load_partial_config(&self) -> Result<Option<PartialAppConfig>, ConfigError> {
        let config_path = match &self.path {
            Some(path) => path.clone(),
            None => {
                let default_path = PathBuf::from(CONFIG_FILE_NAME);
                if !default_path.exists() {
                    return Ok(None);
                }
                default_path
            }
        };

        let content = fs::read_to_string(&config_path).map_err(|e| {
            ConfigError::FileRead(config_path.to_string_lossy().to_string(), e)
        })?;

        let partial_config: PartialAppConfig = toml::from_str(&content).map_err(|e| {
            ConfigError::TomlParse(config_path.to_string_lossy().to_string(), e)
        })?;

        Ok(Some(partial_config))
    }

    /// Collect relevant environment variables
    fn collect_env_vars(&self) -> HashMap<String, String> {
        let env_keys = [ENV_REFRESH_PERIOD_SECS, ENV_LOG_LEVEL, ENV_LOG_FORMAT];

        let mut env_map = HashMap::new();
        for key in &env_keys {
            if let Ok(value) = env::var(key) {
                env_map.insert(key.to_string(), value);
            }
        }
        env_map
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

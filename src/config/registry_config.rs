use crate::errors::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::app_config::ENV_REFRESH_PERIOD_SECS;

/// Settings for the container registry cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Minimum time between configuration re-reads for one scope
    pub refresh_period: Duration,
}

/// Partial registry settings for loading from files
#[derive(Deserialize, Debug, Default)]
pub struct PartialRegistrySettings {
    pub refresh_period_secs: Option<u64>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            refresh_period: Duration::from_secs(default_refresh_period_secs()),
        }
    }
}

impl RegistrySettings {
    pub fn with_refresh_period(refresh_period: Duration) -> Self {
        Self { refresh_period }
    }

    /// Environment overrides file, file overrides defaults
    pub fn from_env_or_file(
        partial: Option<PartialRegistrySettings>,
        env_map: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();

        let secs = match env_map.get(ENV_REFRESH_PERIOD_SECS) {
            Some(value) => value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                field: ENV_REFRESH_PERIOD_SECS.to_string(),
                value: value.clone(),
            })?,
            None => partial
                .refresh_period_secs
                .unwrap_or_else(default_refresh_period_secs),
        };

        if secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "registry.refresh_period_secs".to_string(),
                value: secs.to_string(),
            });
        }

        Ok(Self {
            refresh_period: Duration::from_secs(secs),
        })
    }
}

fn default_refresh_period_secs() -> u64 {
    30
}

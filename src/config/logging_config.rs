use crate::errors::ConfigError;
use crate::logging::LogFormat;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::Level;

use super::app_config::{ENV_LOG_FORMAT, ENV_LOG_LEVEL};

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: Level,
    pub format: LogFormat,
}

/// Partial logging settings for loading from files
#[derive(Deserialize, Debug, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingSettings {
    pub fn from_env_or_file(
        partial: Option<PartialLoggingSettings>,
        env_map: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();
        let defaults = Self::default();

        let level = match env_map.get(ENV_LOG_LEVEL).or(partial.level.as_ref()) {
            Some(value) => parse_setting::<Level>("logging.level", value)?,
            None => defaults.level,
        };
        let format = match env_map.get(ENV_LOG_FORMAT).or(partial.format.as_ref()) {
            Some(value) => parse_setting::<LogFormat>("logging.format", value)?,
            None => defaults.format,
        };

        Ok(Self { level, format })
    }
}

fn parse_setting<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

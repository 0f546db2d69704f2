use std::fs;
use std::path::Path;

use crate::shared::errors::AppError;
use crate::shared::types::MonitorConfig;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MonitorConfig, AppError> {
        let config_content = fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::ConfigError(format!("Failed to read config file: {}", e)))?;

        Self::parse(&config_content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<MonitorConfig, AppError> {
        let config: MonitorConfig = toml::from_str(content)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        if config.scan.max_concurrent_fetches == 0 {
            return Err(AppError::ConfigError(
                "scan.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if config.hotels.iter().filter(|h| h.is_target).count() > 1 {
            return Err(AppError::ConfigError(
                "at most one hotel may be marked is_target".to_string(),
            ));
        }

        Ok(config)
    }
}

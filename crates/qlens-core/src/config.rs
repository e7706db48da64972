//! Configuration for qlens
//!
//! Provides:
//! - Config file discovery (CLI flag, env var, standard paths)
//! - TOML parsing with serde
//! - Environment variable overrides

use crate::trace_file::{ParseOptions, DEFAULT_GROUP_ID_FIELD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete qlens configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QlensConfig {
    pub general: GeneralSettings,

    /// Protocol visibility
    pub view: ViewSettings,

    pub import: ImportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level: trace, debug, info, warn, error (default warn)
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    /// Include QUIC events
    pub show_transport: bool,

    /// Include MoQ events
    pub show_application: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            show_transport: true,
            show_application: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Event key carrying the connection id
    pub group_id_field: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            group_id_field: DEFAULT_GROUP_ID_FIELD.to_string(),
        }
    }
}

impl ImportSettings {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            group_id_field: self.group_id_field.clone(),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    /// Path to config file (if specified via CLI)
    cli_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { cli_path: None }
    }

    /// Set the config path from CLI argument
    pub fn with_cli_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_path = path;
        self
    }

    /// Load configuration with the following precedence:
    /// 1. CLI --config flag
    /// 2. QLENS_CONFIG environment variable
    /// 3. <platform config dir>/qlens/config.toml
    /// 4. /etc/qlens/config.toml
    /// 5. Default values
    pub fn load(&self) -> ConfigResult<QlensConfig> {
        let mut config = match self.find_config_file() {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)?
            }
            None => {
                debug!("No config file found, using defaults");
                QlensConfig::default()
            }
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        validate(&config)?;

        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!("CLI config path does not exist: {}", path.display());
        }

        if let Ok(env_path) = std::env::var("QLENS_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            warn!("QLENS_CONFIG path does not exist: {}", env_path);
        }

        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Some(path);
            }
        }

        #[cfg(unix)]
        {
            let path = PathBuf::from("/etc/qlens/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<QlensConfig> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: QlensConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, config: &QlensConfig, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| {
            ConfigError::ValidationError(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Get the default config file path for the current platform
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("qlens").join("config.toml"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `QLENS_*` overrides read through `lookup`
fn apply_env_overrides<F>(config: &mut QlensConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("QLENS_LOG_LEVEL") {
        config.general.log_level = val;
    }
    if let Some(val) = lookup("QLENS_SHOW_TRANSPORT") {
        config.view.show_transport = val.parse().unwrap_or(config.view.show_transport);
    }
    if let Some(val) = lookup("QLENS_SHOW_APPLICATION") {
        config.view.show_application = val.parse().unwrap_or(config.view.show_application);
    }
    if let Some(val) = lookup("QLENS_GROUP_ID_FIELD") {
        config.import.group_id_field = val;
    }
}

fn validate(config: &QlensConfig) -> ConfigResult<()> {
    if !VALID_LOG_LEVELS.contains(&config.general.log_level.to_lowercase().as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "Invalid log level: {}. Must be one of: {:?}",
            config.general.log_level, VALID_LOG_LEVELS
        )));
    }

    if config.import.group_id_field.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Group id field cannot be empty".to_string(),
        ));
    }

    Ok(())
}

//! Configuration management for Dayplan
//!
//! This module handles loading, parsing, and validation of configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub user: UserConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// User-facing planner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Name shown in the greeting
    pub name: String,
    /// Hour (0-23) at which the planner's logical day begins.
    /// Tasks before this hour belong to the previous day.
    pub day_start_hour: u32,
    /// Enable task notifications
    pub notifications: bool,
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Calendar to read from and write to
    pub calendar_id: String,
    /// IANA time zone used when creating timed events
    pub time_zone: String,
    /// How far back the full fetch reaches, in days
    pub lookback_days: i64,
    /// Retry ceiling for a queued mutation before it is dropped
    pub max_replay_attempts: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            day_start_hour: 6,
            notifications: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            time_zone: "UTC".to_string(),
            lookback_days: 365,
            max_replay_attempts: 5,
        }
    }
}

impl Config {
    /// Load configuration from file or return defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_file()?;

        if let Some(path) = config_path {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in order of precedence
    fn find_config_file() -> Result<Option<PathBuf>> {
        // 1. Check current directory
        let current_dir_config = PathBuf::from("dayplan.toml");
        if current_dir_config.exists() {
            return Ok(Some(current_dir_config));
        }

        // 2. Check XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("dayplan").join("config.toml");
            if xdg_config.exists() {
                return Ok(Some(xdg_config));
            }
        }

        Ok(None)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.user.day_start_hour > 23 {
            anyhow::bail!(
                "day_start_hour must be between 0 and 23, got {}",
                self.user.day_start_hour
            );
        }

        if self.sync.calendar_id.is_empty() {
            anyhow::bail!("calendar_id cannot be empty");
        }

        if self.sync.lookback_days < 1 || self.sync.lookback_days > 3650 {
            anyhow::bail!(
                "lookback_days must be between 1 and 3650, got {}",
                self.sync.lookback_days
            );
        }

        if self.sync.max_replay_attempts == 0 {
            anyhow::bail!("max_replay_attempts must be at least 1");
        }

        Ok(())
    }

    /// Generate default configuration file
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Self::default();
        let toml_content = toml::to_string_pretty(&config).context("Failed to serialize default config")?;

        // Add header comment
        let header = format!(
            "# Dayplan Configuration File\n# Generated on {}\n\n",
            chrono::Local::now().format("%Y-%m-%d")
        );

        let full_content = header + &toml_content;

        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        std::fs::write(&path, full_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        println!("Configuration file generated: {}", path.as_ref().display());
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn get_xdg_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
            .map(|dir| dir.join("dayplan"))
    }

    /// Get the default config file path
    pub fn get_default_config_path() -> Result<PathBuf> {
        Ok(Self::get_xdg_config_dir()?.join("config.toml"))
    }
}

//! tickwork configuration system
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Environment variables (TICKWORK_LOG)
//! 3. Explicit config file (--config)
//! 4. User-level (~/.config/tickwork/config.toml)
//! 5. Default values
//! ```
//!
//! # Usage
//!
//! ```rust
//! use tickwork::util::config::{load_config, TickworkConfig};
//!
//! // Falls back to defaults when no config file exists
//! let config: TickworkConfig = load_config(None).unwrap();
//! assert!(config.scheduler.max_nesting_depth > 0);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::runtime::scheduler::SchedulerConfig;
use crate::util::logger::LogLevel;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TickworkConfig {
    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Simulated host settings
    #[serde(default)]
    pub host: HostConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Simulated host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Seconds per frame
    #[serde(default = "default_frame_dt")]
    pub frame_dt: f64,
    /// Frame budget for a demo run
    #[serde(default = "default_max_frames")]
    pub max_frames: u64,
}

fn default_frame_dt() -> f64 {
    0.1
}

fn default_max_frames() -> u64 {
    600
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            frame_dt: default_frame_dt(),
            max_frames: default_max_frames(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogConfig {
    /// Minimum level
    #[serde(default)]
    pub level: LogLevel,
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("tickwork"));
    }

    // Fallback to ~/.config/tickwork
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("tickwork"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("tickwork"));
    }

    None
}

/// Get the user config file path (~/.config/tickwork/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load configuration from `path`, or from the user config file when `None`.
///
/// A missing file yields the defaults; a malformed one is an error.
pub fn load_config(path: Option<&Path>) -> Result<TickworkConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match get_config_path() {
            Some(p) => p,
            None => return Ok(TickworkConfig::default()),
        },
    };

    if !path.exists() {
        return Ok(TickworkConfig::default());
    }

    let content = fs::read_to_string(&path)?;
    parse_config(&content)
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<TickworkConfig, ConfigError> {
    let config: TickworkConfig = toml::from_str(content)?;
    if config.scheduler.max_nesting_depth == 0 {
        return Err(ConfigError::Invalid(
            "scheduler.max_nesting_depth must be at least 1".to_string(),
        ));
    }
    if !(config.host.frame_dt.is_finite() && config.host.frame_dt > 0.0) {
        return Err(ConfigError::Invalid(
            "host.frame_dt must be a positive number of seconds".to_string(),
        ));
    }
    Ok(config)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config(
    config: &TickworkConfig,
    path: &Path,
) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;

    Ok(())
}

/// Save user-level configuration
pub fn save_user_config(config: &TickworkConfig) -> Result<(), ConfigError> {
    let path = get_config_path().ok_or(ConfigError::NoConfigDir)?;
    save_config(config, &path)
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Cannot determine config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TickworkConfig::default();
        assert_eq!(config.scheduler.max_nesting_depth, 64);
        assert!(config.scheduler.catch_panics);
        assert_eq!(config.host.frame_dt, 0.1);
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = parse_config(
            r#"
            [scheduler]
            max_nesting_depth = 8

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.max_nesting_depth, 8);
        assert!(config.scheduler.catch_panics);
        assert_eq!(config.host, HostConfig::default());
        assert_eq!(config.log.level, LogLevel::Debug);
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = parse_config("[scheduler]\nmax_nesting_depth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = parse_config("[host]\nframe_dt = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = parse_config("[log]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = TickworkConfig::default();
        config.scheduler.catch_panics = false;
        config.host.frame_dt = 0.5;
        save_config(&config, &path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(loaded, TickworkConfig::default());
    }
}

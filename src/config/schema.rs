//! Configuration schema for cached-venv
//!
//! Configuration is stored at `~/.config/cached-venv/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Virtual environment settings
    pub venv: VenvConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Virtual environment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VenvConfig {
    /// Directory, relative to the workspace, holding all environments
    pub root: PathBuf,

    /// Interpreter used to create environments
    pub python: String,
}

impl Default for VenvConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".venvs"),
            python: "python3".to_string(),
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Restore environments from the cache (default: true)
    pub enabled: bool,

    /// Store directory (default: user cache dir)
    pub dir: Option<PathBuf>,

    /// Remove entries older than N days on `cache gc` (0 = disabled)
    pub gc_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            gc_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[venv]"));
        assert!(toml.contains("[cache]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.venv.root, PathBuf::from(".venvs"));
        assert_eq!(config.venv.python, "python3");
        assert!(config.cache.enabled);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [venv]
            python = "python3.12"

            [cache]
            dir = "/var/cache/venvs"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.venv.python, "python3.12");
        assert_eq!(config.venv.root, PathBuf::from(".venvs")); // default preserved
        assert_eq!(config.cache.dir, Some(PathBuf::from("/var/cache/venvs")));
        assert_eq!(config.cache.gc_days, 30);
    }
}

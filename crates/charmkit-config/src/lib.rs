//! User configuration for the charmkit CLI
//!
//! Settings live in a TOML file at `$CHARMKIT_CONFIG` or, by default,
//! `~/.config/charmkit/charmkit.toml`. Every key is optional; unset keys fall
//! back to the defaults exposed by the `get_*` accessors.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "CHARMKIT_CONFIG";

/// Keys accepted by [`Config::set`].
pub const KNOWN_KEYS: &[&str] = &["license-header", "base-class", "base-module", "root"];

pub const DEFAULT_BASE_CLASS: &str = "Unit";
pub const DEFAULT_BASE_MODULE: &str = "charmkit";

/// Error type for configuration loading and saving
#[derive(Debug)]
pub enum ConfigError {
    /// Neither the override variable nor a home directory is available
    NoConfigDir,
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    UnknownKey(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "Could not determine home directory"),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Serialize(e) => write!(f, "Failed to serialize config: {}", e),
            ConfigError::UnknownKey(key) => write!(
                f,
                "Unknown config key: {}. Supported keys: {}",
                key,
                KNOWN_KEYS.join(", ")
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Text prepended to every generated manifest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_header: Option<String>,
    /// Name of the unit base class looked for in charm sources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_class: Option<String>,
    /// Module the base class is imported from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_module: Option<String>,
    /// Default output root for `unpack`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl Config {
    pub fn path() -> Result<PathBuf, ConfigError> {
        // Honor explicit override for tests / isolated runs.
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }

        #[cfg(not(target_os = "windows"))]
        let default = dirs::home_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(".config")
            .join("charmkit")
            .join("charmkit.toml");

        #[cfg(target_os = "windows")]
        let default = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("charmkit")
            .join("charmkit.toml");

        Ok(default)
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`; a missing file is an empty config.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content).map_err(ConfigError::Parse)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "license-header" => self.license_header.clone(),
            "base-class" => self.base_class.clone(),
            "base-module" => self.base_module.clone(),
            "root" => self.root.clone(),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        match key {
            "license-header" => self.license_header = Some(value),
            "base-class" => self.base_class = Some(value),
            "base-module" => self.base_module = Some(value),
            "root" => self.root = Some(value),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.license_header.is_none()
            && self.base_class.is_none()
            && self.base_module.is_none()
            && self.root.is_none()
    }

    pub fn values_iter(&self) -> Vec<(&str, String)> {
        KNOWN_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }

    pub fn get_license_header(&self) -> String {
        self.license_header.clone().unwrap_or_default()
    }

    pub fn get_base_class(&self) -> String {
        self.base_class
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_CLASS.to_string())
    }

    pub fn get_base_module(&self) -> String {
        self.base_module
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_MODULE.to_string())
    }

    pub fn get_root(&self) -> PathBuf {
        self.root
            .as_deref()
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_new() {
        let config = Config::default();
        assert!(config.is_empty());
        assert_eq!(config.get_base_class(), "Unit");
        assert_eq!(config.get_base_module(), "charmkit");
        assert_eq!(config.get_license_header(), "");
        assert_eq!(config.get_root(), PathBuf::from("."));
    }

    #[test]
    fn test_config_set_get() {
        let mut config = Config::default();
        config.set("base-class", "CharmBase".to_string()).unwrap();
        assert_eq!(config.get("base-class"), Some("CharmBase".to_string()));
        assert_eq!(config.get_base_class(), "CharmBase");
        assert!(!config.is_empty());
    }

    #[test]
    fn test_config_unknown_key() {
        let mut config = Config::default();
        let err = config.set("unknown-key", "value".to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(ref key) if key == "unknown-key"));
        assert!(err.to_string().contains("license-header"));
        assert_eq!(config.get("unknown-key"), None);
    }

    #[test]
    fn test_values_iter_follows_key_order() {
        let mut config = Config::default();
        config.set("root", "/srv/charm".to_string()).unwrap();
        config
            .set("license-header", "# header\n".to_string())
            .unwrap();
        let keys: Vec<&str> = config.values_iter().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["license-header", "root"]);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("charmkit.toml");

        let mut config = Config::default();
        config
            .set("license-header", "# Copyright\n\n".to_string())
            .unwrap();
        config.set("base-module", "ops_kit".to_string()).unwrap();
        config.save_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("base-module"));
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("absent.toml")).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("charmkit.toml");
        std::fs::write(&path, "base-class = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}

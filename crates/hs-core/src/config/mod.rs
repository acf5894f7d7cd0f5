//! Configuration management for validator-hotswap

mod env_file;
pub mod serde_utils;
mod settings;

pub use env_file::{apply_env_overrides, load_env_file, ENV_KEYS};
pub use settings::{HotswapConfig, InstallPaths, LocalSettings, RemoteSettings, SwapSettings};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("validator-hotswap")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Get the default `.env` path holding secondary ssh settings
pub fn default_env_path() -> PathBuf {
    default_config_dir().join(".env")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Expand a leading `~` or `$HOME` against the local home directory.
///
/// Only for local paths; remote paths are expanded on the remote host.
pub fn expand_home(path: &Path) -> PathBuf {
    let Some(home) = dirs::home_dir() else {
        return path.to_path_buf();
    };
    let raw = path.to_string_lossy();
    for prefix in ["~", "$HOME", "${HOME}"] {
        if raw == prefix {
            return home;
        }
        if let Some(rest) = raw.strip_prefix(&format!("{}/", prefix)) {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        let err = load_config::<HotswapConfig>(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_save_then_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = HotswapConfig::default();
        config.secondary.host = "10.1.1.7".into();
        config.swap.mode = "armed".into();
        save_config(&path, &config).unwrap();

        let loaded: HotswapConfig = load_config(&path).unwrap();
        assert_eq!(loaded.secondary.host, "10.1.1.7");
        assert_eq!(loaded.swap.mode, "armed");
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home(Path::new("~/solana/id.json")), home.join("solana/id.json"));
        assert_eq!(expand_home(Path::new("$HOME/config.toml")), home.join("config.toml"));
        assert_eq!(expand_home(Path::new("/mnt/ledger")), PathBuf::from("/mnt/ledger"));
        assert_eq!(expand_home(Path::new("~other/x")), PathBuf::from("~other/x"));
    }
}

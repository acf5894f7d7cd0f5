//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};

use hs_core::config::{self, HotswapConfig};

use super::{load_settings, resolve_config_path};
use crate::output::{print_error, print_info, print_success, print_warning};

/// Show the effective configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_config_path(config_path);
    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Showing built-in defaults; run 'hotswap config init' to write them");
    }
    println!();

    let config = load_settings(config_path)?;
    let content = toml::to_string_pretty(&config).context("Failed to render config")?;
    println!("{}", content);
    Ok(())
}

/// Print the config file path
pub fn config_path(config_path: Option<&Path>) {
    println!("{}", resolve_config_path(config_path).display());
}

/// Write the default configuration
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve_config_path(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&path, &HotswapConfig::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Created configuration file: {:?}", path));

    let env = config::default_env_path();
    if !env.exists() {
        print_info(&format!("Put SECONDARY ssh settings (SSH_HOST, SSH_USER, ...) in {:?}", env));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        config_init(Some(&path), false).unwrap();
        let loaded: HotswapConfig = config::load_config(&path).unwrap();
        assert_eq!(loaded.swap.mode, "sequential");

        std::fs::write(&path, "[swap]\nmode = \"armed\"\n").unwrap();
        config_init(Some(&path), false).unwrap();
        let kept: HotswapConfig = config::load_config(&path).unwrap();
        assert_eq!(kept.swap.mode, "armed");
    }
}

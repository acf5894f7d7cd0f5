//! CLI command implementations

mod check;
mod config;
mod detect;
mod swap;
mod verify;

pub use check::check_command;
pub use config::{config_init, config_path, config_show};
pub use detect::detect_command;
pub use swap::{swap_command, SwapArgs};
pub use verify::{verify_command, VerifyArgs};

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};

use hs_core::config::HotswapConfig;
use hs_core::ConfigError;

/// Exit status after the operator declined
pub const EXIT_CANCELLED: u8 = 130;

/// Exit status when SECONDARY cannot be reached
pub const EXIT_UNREACHABLE: u8 = 3;

/// Map an exit status to [`ExitCode`]
pub fn exit_code(code: u8) -> ExitCode {
    ExitCode::from(code)
}

/// Config file in use
pub fn resolve_config_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(hs_core::config::default_config_path)
}

/// Load the configuration. A missing default file falls back to built-in
/// defaults; a missing explicit `--config` is an error.
pub fn load_settings(config_path: Option<&Path>) -> Result<HotswapConfig> {
    let path = resolve_config_path(config_path);
    match hs_core::config::load_config::<HotswapConfig>(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) if config_path.is_none() => {
            tracing::info!("No config at {:?}, using defaults", path);
            Ok(HotswapConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config from {:?}", path)),
    }
}

/// Apply `.env` and process environment overrides to the secondary endpoint
pub fn apply_env(config: &mut HotswapConfig, env_file: Option<&Path>) -> Result<()> {
    let path = env_file
        .map(Path::to_path_buf)
        .unwrap_or_else(hs_core::config::default_env_path);
    let vars = hs_core::config::load_env_file(&path)
        .with_context(|| format!("Failed to read env file {:?}", path))?;
    hs_core::config::apply_env_overrides(&mut config.secondary, &vars, |k| std::env::var(k).ok())
        .context("Invalid SECONDARY ssh settings (set SSH_HOST in the .env file or config)")?;
    Ok(())
}

/// Remote ledger as configured, defaulting to the local ledger path
pub fn remote_ledger(config: &HotswapConfig) -> String {
    config
        .remote
        .ledger
        .clone()
        .unwrap_or_else(|| config.local.ledger.to_string_lossy().into_owned())
}

//! Hot-swap configuration file

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::expand_home;
use super::serde_utils::duration_millis;
use crate::types::Endpoint;

/// Complete configuration file (`config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HotswapConfig {
    /// ssh settings for the SECONDARY host
    pub secondary: Endpoint,
    /// Paths on MAIN
    pub local: LocalSettings,
    /// Paths on SECONDARY
    pub remote: RemoteSettings,
    /// Swap behaviour defaults
    pub swap: SwapSettings,
}

/// Install locations of both implementations' binaries and configs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    /// `agave-validator` binary
    pub agave_cli: String,
    /// `fdctl` binary
    pub fdctl: String,
    /// Firedancer `config.toml`
    pub fd_config: String,
}

/// Paths on the local (MAIN) host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Ledger directory of the running validator
    pub ledger: PathBuf,
    /// Staked validator keypair
    pub validator_key: PathBuf,
    /// Unstaked placeholder identity MAIN switches to
    pub unstaked_identity: PathBuf,
    pub agave_cli: PathBuf,
    pub fdctl: PathBuf,
    pub fd_config: PathBuf,
}

impl Default for LocalSettings {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_default();
        Self {
            ledger: PathBuf::from("/mnt/nvme1/ledger"),
            validator_key: home.join("solana/validator-keypair.json"),
            unstaked_identity: home.join("solana/unstaked-identity.json"),
            agave_cli: home.join(".local/share/solana/install/active_release/bin/agave-validator"),
            fdctl: home.join("firedancer/bin/fdctl"),
            fd_config: home.join("config.toml"),
        }
    }
}

impl LocalSettings {
    /// Local install paths with `~`/`$HOME` expanded
    pub fn install(&self) -> InstallPaths {
        InstallPaths {
            agave_cli: expand_home(&self.agave_cli).to_string_lossy().into_owned(),
            fdctl: expand_home(&self.fdctl).to_string_lossy().into_owned(),
            fd_config: expand_home(&self.fd_config).to_string_lossy().into_owned(),
        }
    }
}

/// Paths on the remote (SECONDARY) host.
///
/// Values are raw strings and may use `~` or `$VARS`; they are expanded on
/// the remote host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Staked validator keypair SECONDARY switches to
    pub validator_key: String,
    /// Ledger directory, defaults to the local ledger path when unset
    pub ledger: Option<String>,
    pub agave_cli: String,
    pub fdctl: String,
    pub fd_config: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            validator_key: "$HOME/solana/validator-keypair.json".to_string(),
            ledger: None,
            agave_cli: "$HOME/.local/share/solana/install/active_release/bin/agave-validator"
                .to_string(),
            fdctl: "$HOME/firedancer/bin/fdctl".to_string(),
            fd_config: "$HOME/config.toml".to_string(),
        }
    }
}

impl RemoteSettings {
    /// Remote install paths, unexpanded
    pub fn install(&self) -> InstallPaths {
        InstallPaths {
            agave_cli: self.agave_cli.clone(),
            fdctl: self.fdctl.clone(),
            fd_config: self.fd_config.clone(),
        }
    }
}

/// Swap behaviour defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapSettings {
    /// Trigger strategy when SECONDARY runs Firedancer: sequential | armed | bg
    pub mode: String,
    /// Delay between the local spawn and the remote release
    #[serde(rename = "trigger_delay_ms", with = "duration_millis")]
    pub trigger_delay: Duration,
    /// Delete stale tower files on SECONDARY before switching
    pub cleanup_remote_tower: bool,
    /// Copy MAIN's tower file to SECONDARY over scp first
    pub sync_tower: bool,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            mode: "sequential".to_string(),
            trigger_delay: Duration::from_millis(10),
            cleanup_remote_tower: true,
            sync_tower: true,
        }
    }
}

//! Reachability check

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;

use hs_swap::{check_connection, SshTransport};

use super::{apply_env, exit_code, load_settings, EXIT_UNREACHABLE};
use crate::output::{print_error, print_success};

/// Check SECONDARY is reachable over ssh
pub async fn check_command(config_path: Option<&Path>, env_file: Option<&Path>) -> Result<ExitCode> {
    let mut config = load_settings(config_path)?;
    apply_env(&mut config, env_file)?;

    match check_connection(&SshTransport::new(), &config.secondary).await {
        Ok(()) => {
            print_success(&format!("SECONDARY reachable: {}", config.secondary));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_error(&format!("SECONDARY unreachable: {}", e));
            Ok(exit_code(EXIT_UNREACHABLE))
        }
    }
}

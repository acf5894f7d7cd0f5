//! Client detection on both hosts

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use hs_core::HostRole;
use hs_swap::{ClientDetector, SshTransport, SysinfoSnapshot};

use super::{apply_env, load_settings, remote_ledger};
use crate::output::{format_detection, Detection};

/// Classify the validator client running on MAIN and SECONDARY
pub async fn detect_command(
    config_path: Option<&Path>,
    env_file: Option<&Path>,
    ledger: Option<&Path>,
    remote_ledger_override: Option<&str>,
) -> Result<()> {
    let mut config = load_settings(config_path)?;
    apply_env(&mut config, env_file)?;

    let local_ledger = ledger
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.local.ledger.to_string_lossy().into_owned());
    let remote_ledger = remote_ledger_override
        .map(str::to_string)
        .unwrap_or_else(|| remote_ledger(&config));

    let detector = ClientDetector::new(Arc::new(SshTransport::new()), Arc::new(SysinfoSnapshot::new()));
    let main = detector.detect_local(Some(local_ledger.as_str())).await?;
    let secondary = detector
        .detect_remote(&config.secondary, Some(remote_ledger.as_str()))
        .await?;

    println!(
        "{}",
        format_detection(&[
            Detection {
                role: HostRole::Main,
                host: "localhost".to_string(),
                ledger: local_ledger,
                client: main,
            },
            Detection {
                role: HostRole::Secondary,
                host: config.secondary.to_string(),
                ledger: remote_ledger,
                client: secondary,
            },
        ])
    );
    Ok(())
}

//! Remote tower file handling
//!
//! A stale `tower*-<pubkey>.bin` on SECONDARY would make the validator
//! resume from outdated vote lockouts. Before a swap MAIN's current tower is
//! copied over when possible; otherwise the cleanup deletes every match and
//! then counts what is left. Only leftovers are an error.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use hs_core::traits::{RemoteExec, RunOptions, TowerSync};
use hs_core::{Endpoint, SwapError};

use crate::session::RemoteSession;
use crate::ssh::build_scp_args;

/// Prefix of the report line printed by [`cleanup_script`]
pub const REPORT_PREFIX: &str = "TOWER_LEFT:";

/// Upper bound on one tower copy
const SCP_TIMEOUT: Duration = Duration::from_secs(15);

/// Tower file the validator keeps for `pubkey`
pub fn tower_file_name(pubkey: &str) -> String {
    format!("tower-1_9-{}.bin", pubkey)
}

/// Shell snippet deleting the tower files of `pubkey` in `ledger` and
/// printing `TOWER_LEFT:<n>`
pub fn cleanup_script(ledger: &str, pubkey: &str) -> String {
    format!(
        "dir={}; pk={}; rm -f \"$dir\"/tower*-\"$pk\".bin || true; n=0; \
         for f in \"$dir\"/tower*-\"$pk\".bin; do [ -e \"$f\" ] && n=$((n+1)); done; \
         echo {}$n",
        shell_words::quote(ledger),
        shell_words::quote(pubkey),
        REPORT_PREFIX
    )
}

/// Check the cleanup report in `stdout`
pub fn check_report(stdout: &str, ledger: &str) -> Result<(), SwapError> {
    let remaining = stdout
        .lines()
        .rev()
        .find_map(|l| l.trim().strip_prefix(REPORT_PREFIX))
        .and_then(|n| n.trim().parse::<usize>().ok())
        .ok_or_else(|| SwapError::UnexpectedOutput {
            what: "tower cleanup",
            output: stdout.to_string(),
        })?;

    if remaining > 0 {
        return Err(SwapError::CleanupIncomplete {
            dir: ledger.to_string(),
            remaining,
        });
    }
    Ok(())
}

/// Clean up over an open session
pub async fn cleanup_on_session(
    session: &mut RemoteSession,
    ledger: &str,
    pubkey: &str,
) -> Result<(), SwapError> {
    tracing::debug!("tower cleanup in {} (session)", ledger);
    let (stdout, _) = session.run(&cleanup_script(ledger, pubkey), true).await?;
    check_report(&stdout, ledger)
}

/// Clean up with a one-shot command
pub async fn cleanup_once(
    exec: &dyn RemoteExec,
    endpoint: &Endpoint,
    ledger: &str,
    pubkey: &str,
) -> Result<(), SwapError> {
    tracing::debug!("tower cleanup in {} (one-shot)", ledger);
    let output = exec
        .run_once(endpoint, &cleanup_script(ledger, pubkey), RunOptions::plain())
        .await?;
    if !output.success() {
        return Err(SwapError::RemoteCommand {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    check_report(&output.stdout, ledger)
}

/// [`TowerSync`] copying MAIN's tower into SECONDARY's ledger with `scp`
#[derive(Debug, Clone)]
pub struct ScpTowerSync {
    program: String,
    timeout: Duration,
}

impl ScpTowerSync {
    /// Use `scp` from `PATH`
    pub fn new() -> Self {
        Self {
            program: "scp".to_string(),
            timeout: SCP_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: SCP_TIMEOUT,
        }
    }
}

impl Default for ScpTowerSync {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TowerSync for ScpTowerSync {
    async fn migrate(
        &self,
        pubkey: &str,
        main_ledger: &str,
        secondary: &Endpoint,
        remote_ledger: &str,
    ) -> Result<bool, SwapError> {
        let source = Path::new(main_ledger).join(tower_file_name(pubkey));
        let present = tokio::fs::metadata(&source)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !present {
            tracing::debug!("no tower at {:?}, nothing to copy", source);
            return Ok(false);
        }

        let target = format!("{}/", remote_ledger.trim_end_matches('/'));
        let args = build_scp_args(secondary, &source, &target);
        tracing::debug!("{} {}", self.program, shell_words::join(&args));

        let mut copy = Command::new(&self.program);
        copy.args(&args).stdin(Stdio::null()).kill_on_drop(true);
        let output = tokio::time::timeout(self.timeout, copy.output())
            .await
            .map_err(|_| SwapError::Timeout {
                program: self.program.clone(),
                after: self.timeout,
            })?
            .map_err(|source| SwapError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SwapError::RemoteCommand {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        tracing::info!("Tower {} copied to {}", tower_file_name(pubkey), secondary);
        Ok(true)
    }
}

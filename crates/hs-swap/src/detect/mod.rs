//! Validator client detection
//!
//! Locally the process table is scanned directly. On the remote host a
//! cascade runs from cheapest to most thorough:
//!
//! 1. `pgrep` for Firedancer processes in run mode
//! 2. `pgrep -x` for Agave
//! 3. a full process dump, classified here
//!
//! A tier that fails to run counts as a miss.

mod classify;
mod snapshot;

pub use classify::{
    classify_local, classify_remote, has_run_token, is_agave_validator, is_fd_validator,
    AGAVE_NAMES, FD_NAMES,
};
pub use snapshot::{parse_dump, RemoteProcSnapshot, SysinfoSnapshot};

use std::sync::Arc;

use hs_core::traits::{ProcessSnapshotProvider, RemoteExec, RunOptions};
use hs_core::{ClientKind, Endpoint, SwapError};

const FD_QUICK: &str = "for n in fdctl firedancer; do \
pgrep -a \"$n\" 2>/dev/null | grep -Eq '(^| )(run|run1)( |$)| run-agave' && echo FD && exit 0; \
done; exit 1";

const AGAVE_QUICK: &str = "for n in agave-validator solana-validator; do \
pgrep -ax \"$n\" >/dev/null 2>&1 && echo AGAVE && exit 0; \
done; exit 1";

const AGAVE_PRESENT: &str = "command -v agave-validator || command -v solana-validator";
const FD_PRESENT: &str = "command -v fdctl";

/// Determines which validator client runs locally and remotely
#[derive(Clone)]
pub struct ClientDetector {
    exec: Arc<dyn RemoteExec>,
    local: Arc<dyn ProcessSnapshotProvider>,
}

impl ClientDetector {
    pub fn new(exec: Arc<dyn RemoteExec>, local: Arc<dyn ProcessSnapshotProvider>) -> Self {
        Self { exec, local }
    }

    /// Classify the local host.
    ///
    /// With a `ledger`, only processes referencing it count; if none do, the
    /// scan is repeated without the filter. When both clients match, Agave
    /// wins.
    pub async fn detect_local(&self, ledger: Option<&str>) -> Result<ClientKind, SwapError> {
        let ledger = ledger.filter(|l| !l.is_empty());
        let processes = self.local.snapshot(ledger.is_some()).await?;

        let scan = |filter: Option<&str>| {
            let mut found = Vec::new();
            for process in &processes {
                let Some(kind) = classify_local(process) else {
                    continue;
                };
                if filter.is_some_and(|dir| !process.references_path(dir)) {
                    continue;
                }
                tracing::debug!("local pid {} classified {}", process.pid, kind);
                found.push(kind);
            }
            found
        };

        let mut found = scan(ledger);
        if found.is_empty() && ledger.is_some() {
            tracing::debug!("no client references the ledger, rescanning unfiltered");
            found = scan(None);
        }

        let kind = if found.contains(&ClientKind::Agave) && found.contains(&ClientKind::Fd) {
            ClientKind::Agave
        } else {
            found.first().copied().unwrap_or(ClientKind::Unknown)
        };
        tracing::info!("MAIN client: {}", kind);
        Ok(kind)
    }

    /// Classify the remote host through the three-tier cascade
    pub async fn detect_remote(
        &self,
        endpoint: &Endpoint,
        ledger: Option<&str>,
    ) -> Result<ClientKind, SwapError> {
        if self.quick_check(endpoint, FD_QUICK, "FD").await {
            tracing::info!("SECONDARY client: FD (pgrep)");
            return Ok(ClientKind::Fd);
        }
        if self.quick_check(endpoint, AGAVE_QUICK, "AGAVE").await {
            tracing::info!("SECONDARY client: AGAVE (pgrep)");
            return Ok(ClientKind::Agave);
        }

        let ledger = ledger.filter(|l| !l.is_empty());
        let snapshot = RemoteProcSnapshot::new(Arc::clone(&self.exec), endpoint.clone());
        let processes = match snapshot.snapshot(ledger.is_some()).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("remote process scan failed: {}", e);
                return Ok(ClientKind::Unknown);
            }
        };

        let kinds: Vec<ClientKind> = processes
            .iter()
            .filter_map(|p| classify_remote(p, ledger))
            .collect();
        let kind = if kinds.contains(&ClientKind::Fd) {
            ClientKind::Fd
        } else if kinds.contains(&ClientKind::Agave) {
            ClientKind::Agave
        } else {
            ClientKind::Unknown
        };
        tracing::info!("SECONDARY client: {} (process scan)", kind);
        Ok(kind)
    }

    /// [`ClientDetector::detect_remote`], then fall back to which client
    /// binary is installed when no process was found
    pub async fn detect_remote_with_fallback(
        &self,
        endpoint: &Endpoint,
        ledger: Option<&str>,
    ) -> Result<ClientKind, SwapError> {
        let kind = self.detect_remote(endpoint, ledger).await?;
        if kind.is_known() {
            return Ok(kind);
        }

        for (script, kind) in [(AGAVE_PRESENT, ClientKind::Agave), (FD_PRESENT, ClientKind::Fd)] {
            match self.exec.run_once(endpoint, script, RunOptions::login()).await {
                Ok(out) if out.success() && !out.stdout_trimmed().is_empty() => {
                    tracing::info!(
                        "SECONDARY client: {} (installed at {})",
                        kind,
                        out.stdout_trimmed()
                    );
                    return Ok(kind);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("client presence check failed: {}", e),
            }
        }
        Ok(ClientKind::Unknown)
    }

    async fn quick_check(&self, endpoint: &Endpoint, script: &str, expect: &str) -> bool {
        match self.exec.run_once(endpoint, script, RunOptions::login()).await {
            Ok(out) => out.stdout_trimmed().eq_ignore_ascii_case(expect),
            Err(e) => {
                tracing::debug!("{} quick check failed: {}", expect, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRemote, FakeSnapshot};
    use hs_core::traits::{CommandOutput, ProcessInfo};
    use std::path::PathBuf;

    fn out(stdout: &str, exit_code: i32) -> CommandOutput {
        CommandOutput {
            stdout: stdout.into(),
            exit_code,
            ..Default::default()
        }
    }

    fn fd_on_nvme() -> ProcessInfo {
        ProcessInfo {
            pid: 100,
            name: "fdctl".into(),
            exe: Some(PathBuf::from("/home/sol/firedancer/bin/fdctl")),
            args: vec!["fdctl".into(), "run".into(), "--config".into(), "/home/sol/config.toml".into()],
            open_files: vec![PathBuf::from("/mnt/nvme1/ledger/rocksdb/LOCK")],
            cwd: Some(PathBuf::from("/home/sol")),
        }
    }

    fn agave_elsewhere() -> ProcessInfo {
        ProcessInfo {
            pid: 200,
            name: "agave-validator".into(),
            args: vec!["agave-validator".into(), "--ledger".into(), "/srv/ledger".into()],
            cwd: Some(PathBuf::from("/srv")),
            ..Default::default()
        }
    }

    fn detector(remote: FakeRemote, local: Vec<ProcessInfo>) -> ClientDetector {
        ClientDetector::new(Arc::new(remote), Arc::new(FakeSnapshot(local)))
    }

    #[tokio::test]
    async fn test_local_ledger_filter_selects_fd() {
        let d = detector(FakeRemote::new(), vec![fd_on_nvme(), agave_elsewhere()]);
        assert_eq!(d.detect_local(Some("/mnt/nvme1/ledger")).await.unwrap(), ClientKind::Fd);
    }

    #[tokio::test]
    async fn test_local_unmatched_filter_rescans() {
        let d = detector(FakeRemote::new(), vec![fd_on_nvme()]);
        assert_eq!(d.detect_local(Some("/other/path")).await.unwrap(), ClientKind::Fd);
    }

    #[tokio::test]
    async fn test_local_both_kinds_prefers_agave() {
        let d = detector(FakeRemote::new(), vec![fd_on_nvme(), agave_elsewhere()]);
        assert_eq!(d.detect_local(None).await.unwrap(), ClientKind::Agave);
    }

    #[tokio::test]
    async fn test_local_nothing_running() {
        let d = detector(FakeRemote::new(), vec![]);
        assert_eq!(d.detect_local(Some("/mnt/nvme1/ledger")).await.unwrap(), ClientKind::Unknown);
    }

    #[tokio::test]
    async fn test_remote_fd_quick_tier() {
        let remote = FakeRemote::new().with_run_once(|cmd| {
            if cmd.contains("fdctl firedancer") {
                out("FD\n", 0)
            } else {
                panic!("later tier ran: {cmd}")
            }
        });
        let d = detector(remote, vec![]);
        let kind = d.detect_remote(&Endpoint::new("h", "u"), None).await.unwrap();
        assert_eq!(kind, ClientKind::Fd);
    }

    #[tokio::test]
    async fn test_remote_agave_quick_tier() {
        let remote = FakeRemote::new().with_run_once(|cmd| {
            if cmd.contains("pgrep -ax") {
                out("AGAVE\n", 0)
            } else {
                out("", 1)
            }
        });
        let d = detector(remote, vec![]);
        let kind = d.detect_remote(&Endpoint::new("h", "u"), None).await.unwrap();
        assert_eq!(kind, ClientKind::Agave);
    }

    #[tokio::test]
    async fn test_remote_scan_tier_applies_ledger_filter() {
        let dump = "P\t7\nN\tagave-validator\nA\tagave-validator\x1f--ledger\x1f/srv/ledger\nC\t/srv\n";
        let remote = FakeRemote::new().with_run_once(move |cmd| {
            if cmd.starts_with("for d in /proc") {
                out(dump, 0)
            } else {
                out("", 1)
            }
        });
        let d = detector(remote, vec![]);
        let endpoint = Endpoint::new("h", "u");

        assert_eq!(
            d.detect_remote(&endpoint, Some("/srv/ledger")).await.unwrap(),
            ClientKind::Agave
        );
        assert_eq!(
            d.detect_remote(&endpoint, Some("/mnt/nvme1/ledger")).await.unwrap(),
            ClientKind::Unknown
        );
    }

    #[tokio::test]
    async fn test_remote_failing_tiers_yield_unknown() {
        let d = detector(FakeRemote::new().with_run_once(|_| out("", 255)), vec![]);
        let kind = d.detect_remote(&Endpoint::new("h", "u"), None).await.unwrap();
        assert_eq!(kind, ClientKind::Unknown);
    }

    #[tokio::test]
    async fn test_presence_fallback() {
        let remote = FakeRemote::new().with_run_once(|cmd| {
            if cmd == FD_PRESENT {
                out("/home/sol/firedancer/bin/fdctl\n", 0)
            } else {
                out("", 1)
            }
        });
        let d = detector(remote, vec![]);
        let kind = d
            .detect_remote_with_fallback(&Endpoint::new("h", "u"), None)
            .await
            .unwrap();
        assert_eq!(kind, ClientKind::Fd);
    }
}

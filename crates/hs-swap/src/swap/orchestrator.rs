//! The swap state machine
//!
//! `Idle -> Prewarmed -> TowerHandled -> Armed/Triggered -> Done | Failed`,
//! with `Cancelled` reachable from the confirmation gate. Nothing on either
//! host is mutated before the gate. After the first mutating command there is
//! no rollback.

use std::sync::Arc;
use std::time::Duration;

use hs_core::config::{expand_home, InstallPaths};
use hs_core::traits::{
    Confirmation, LocalSpawner, NoTowerSync, NoopSink, OperatorSink, RemoteExec, RunOptions,
    TowerSync,
};
use hs_core::{ClientKind, Endpoint, HostRole, SwapError};

use super::mode::SwapMode;
use super::plan::{Dispatch, SwapOutcome, SwapPlan, SwapReport, TowerAction};
use crate::command::CommandBuilder;
use crate::paths::PathResolver;
use crate::session::{ArmedChannel, RemoteSession};
use crate::supervise::{SupervisedChild, WaitOutcome};
use crate::tower;

/// Local wait bound when MAIN runs Firedancer
pub const LOCAL_WAIT_FD: Duration = Duration::from_secs(10);

/// Local wait bound when MAIN runs Agave, and for every Agave-remote swap
pub const LOCAL_WAIT_AGAVE: Duration = Duration::from_secs(6);

/// Waits up to ~1s for `fdctl set-identity` to leave the remote process table.
///
/// The bracket keeps the pattern from matching the `bash -lc` wrapper that
/// carries this script on its own command line.
pub const FD_COMPLETION_POLL: &str = "for i in $(seq 1 10); do \
pgrep -af '[f]dctl.*set-identity' >/dev/null 2>&1 || { echo DONE; exit 0; }; \
sleep 0.1; done; echo TIMEOUT";

/// Upper bound on the completion poll round trip
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Acknowledgement echoed by the background trigger
const BG_ACK: &str = "OK";

/// Everything fixed at the confirmation gate
struct Prepared {
    plan: SwapPlan,
    remote_command: String,
    local_command: Vec<String>,
    /// Resolved remote ledger
    ledger: String,
    tower: TowerAction,
}

impl Prepared {
    fn report(&self, dispatch: Dispatch) -> SwapReport {
        SwapReport {
            dispatch,
            tower: self.tower,
            local_wait: WaitOutcome::StillRunning,
            remote_status: None,
            remote_command: self.remote_command.clone(),
            local_command: self.local_command.clone(),
        }
    }

    fn cleans_tower(&self) -> bool {
        self.tower == TowerAction::Cleaned
    }

    fn local_wait(&self) -> Duration {
        match self.plan.main_client {
            ClientKind::Fd => LOCAL_WAIT_FD,
            _ => LOCAL_WAIT_AGAVE,
        }
    }
}

/// Coordinates the identity change on MAIN and SECONDARY
pub struct SwapOrchestrator {
    exec: Arc<dyn RemoteExec>,
    spawner: Arc<dyn LocalSpawner>,
    resolver: PathResolver,
    sink: Arc<dyn OperatorSink>,
    tower_sync: Arc<dyn TowerSync>,
    endpoint: Endpoint,
    local: CommandBuilder,
    remote: CommandBuilder,
}

impl SwapOrchestrator {
    pub fn new(
        exec: Arc<dyn RemoteExec>,
        spawner: Arc<dyn LocalSpawner>,
        resolver: PathResolver,
        endpoint: Endpoint,
        local_install: InstallPaths,
        remote_install: InstallPaths,
    ) -> Self {
        Self {
            exec,
            spawner,
            resolver,
            sink: Arc::new(NoopSink),
            tower_sync: Arc::new(NoTowerSync),
            endpoint,
            local: CommandBuilder::new(HostRole::Main, local_install),
            remote: CommandBuilder::new(HostRole::Secondary, remote_install),
        }
    }

    /// Report the plan and ask for confirmation through `sink`
    pub fn with_sink(mut self, sink: Arc<dyn OperatorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Try to migrate the tower before falling back to cleanup
    pub fn with_tower_sync(mut self, tower_sync: Arc<dyn TowerSync>) -> Self {
        self.tower_sync = tower_sync;
        self
    }

    /// Run one swap
    pub async fn execute(&self, plan: SwapPlan) -> Result<SwapOutcome, SwapError> {
        let mode = validate(&plan)?;

        let resolved_ledger = self.prewarm(&plan.remote_ledger).await;
        tracing::info!("Prewarmed {}", self.endpoint);

        let remote_command = self
            .remote
            .build_remote(
                &self.resolver,
                &self.endpoint,
                plan.remote_client,
                &plan.remote_ledger,
                &plan.remote_validator_key,
            )
            .await?;
        let local_command = self.local.build_argv(
            plan.main_client,
            &expand_home(&plan.main_ledger).to_string_lossy(),
            &expand_home(&plan.unstaked_identity).to_string_lossy(),
        )?;

        self.sink.plan(&plan.entries(mode));
        self.sink
            .verbose(&format!("MAIN set-identity: {}", shell_words::join(&local_command)));
        self.sink
            .verbose(&format!("SECONDARY set-identity: {}", remote_command));

        if !plan.assume_yes && self.sink.confirm().await == Confirmation::Cancel {
            tracing::info!("Swap cancelled by operator");
            return Ok(SwapOutcome::Cancelled);
        }

        let ledger = match resolved_ledger {
            Some(ledger) => ledger,
            None => self.resolver.resolve(&self.endpoint, &plan.remote_ledger).await?,
        };
        let migrated = self.migrate_tower(&plan, &ledger).await;
        let tower = if migrated {
            TowerAction::Migrated
        } else if plan.cleanup_remote_tower {
            TowerAction::Cleaned
        } else {
            TowerAction::Skipped
        };

        let prepared = Prepared {
            plan,
            remote_command,
            local_command,
            ledger,
            tower,
        };

        let report = match mode {
            Some(SwapMode::Background) => self.dispatch_background(&prepared).await?,
            Some(SwapMode::Sequential) => {
                let mut session = RemoteSession::open(self.exec.as_ref(), &self.endpoint).await?;
                let result = self.dispatch_sequential(&mut session, &prepared).await;
                session.close().await;
                result?
            }
            Some(SwapMode::Armed) => {
                let mut session = RemoteSession::open(self.exec.as_ref(), &self.endpoint).await?;
                let result = self.dispatch_armed(&mut session, &prepared).await;
                session.close().await;
                result?
            }
            None => {
                let mut session = RemoteSession::open(self.exec.as_ref(), &self.endpoint).await?;
                let result = self.dispatch_agave(&mut session, &prepared).await;
                session.close().await;
                result?
            }
        };

        tracing::info!("Swap done ({:?}, local {:?})", report.dispatch, report.local_wait);
        Ok(SwapOutcome::Completed(report))
    }

    async fn prewarm(&self, remote_ledger: &str) -> Option<String> {
        match self.exec.run_once(&self.endpoint, "true", RunOptions::plain()).await {
            Ok(out) if out.success() => {}
            Ok(out) => tracing::warn!("prewarm exited with {}: {}", out.exit_code, out.stderr.trim()),
            Err(e) => tracing::warn!("prewarm failed: {}", e),
        }

        let ledger = match self.resolver.resolve(&self.endpoint, remote_ledger).await {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::warn!("prewarm could not resolve remote ledger: {}", e);
                return None;
            }
        };
        let touch = format!("test -r {}/CURRENT || true", shell_words::quote(&ledger));
        if let Err(e) = self.exec.run_once(&self.endpoint, &touch, RunOptions::plain()).await {
            tracing::warn!("prewarm ledger read failed: {}", e);
        }
        Some(ledger)
    }

    async fn migrate_tower(&self, plan: &SwapPlan, remote_ledger: &str) -> bool {
        let main_ledger = expand_home(&plan.main_ledger);
        match self
            .tower_sync
            .migrate(&plan.pubkey, &main_ledger.to_string_lossy(), &self.endpoint, remote_ledger)
            .await
        {
            Ok(copied) => {
                if copied {
                    self.sink.verbose("tower synced to SECONDARY");
                }
                copied
            }
            Err(e) => {
                tracing::warn!("tower sync skipped: {}", e);
                self.sink.verbose(&format!("tower sync skipped: {}", e));
                false
            }
        }
    }

    fn spawn_local(&self, prepared: &Prepared) -> Result<SupervisedChild, SwapError> {
        let child = SupervisedChild::spawn(self.spawner.as_ref(), &prepared.local_command)?;
        tracing::info!("MAIN set-identity triggered");
        Ok(child)
    }

    async fn trigger_delay(&self, prepared: &Prepared) {
        if !prepared.plan.trigger_delay.is_zero() {
            tokio::time::sleep(prepared.plan.trigger_delay).await;
        }
    }

    async fn dispatch_background(&self, prepared: &Prepared) -> Result<SwapReport, SwapError> {
        if prepared.cleans_tower() {
            tower::cleanup_once(
                self.exec.as_ref(),
                &self.endpoint,
                &prepared.ledger,
                &prepared.plan.pubkey,
            )
            .await?;
        }

        let trigger = format!(
            "echo {}; nohup setsid {} >/dev/null 2>&1 & disown",
            BG_ACK, prepared.remote_command
        );
        self.sink.verbose(&format!("SECONDARY bg trigger: {}", trigger));
        let out = self
            .exec
            .run_once(&self.endpoint, &trigger, RunOptions::plain())
            .await?;
        if !out.stdout.contains(BG_ACK) {
            return Err(SwapError::MissingAck {
                output: out.stdout.trim().to_string(),
            });
        }
        tracing::info!("SECONDARY set-identity triggered (bg)");

        let mut child = self.spawn_local(prepared)?;
        self.trigger_delay(prepared).await;

        let mut report = prepared.report(Dispatch::Firedancer(SwapMode::Background));
        report.local_wait = child.wait_bounded(prepared.local_wait()).await;
        Ok(report)
    }

    async fn dispatch_sequential(
        &self,
        session: &mut RemoteSession,
        prepared: &Prepared,
    ) -> Result<SwapReport, SwapError> {
        if prepared.cleans_tower() {
            tower::cleanup_on_session(session, &prepared.ledger, &prepared.plan.pubkey).await?;
        }

        let mut child = self.spawn_local(prepared)?;
        let mut report = prepared.report(Dispatch::Firedancer(SwapMode::Sequential));
        report.local_wait = child.wait_bounded(prepared.local_wait()).await;

        session
            .run(&format!("exec {}", prepared.remote_command), false)
            .await?;
        tracing::info!("SECONDARY set-identity triggered (sequential)");

        report.remote_status = match self
            .exec
            .run_once(
                &self.endpoint,
                FD_COMPLETION_POLL,
                RunOptions::login().with_timeout(POLL_TIMEOUT),
            )
            .await
        {
            Ok(out) => Some(out.stdout_trimmed().to_string()),
            Err(e) => {
                tracing::debug!("completion poll failed: {}", e);
                None
            }
        };
        if let Some(status) = &report.remote_status {
            self.sink.verbose(&format!("SECONDARY wait status: {}", status));
        }
        Ok(report)
    }

    async fn dispatch_armed(
        &self,
        session: &mut RemoteSession,
        prepared: &Prepared,
    ) -> Result<SwapReport, SwapError> {
        if prepared.cleans_tower() {
            tower::cleanup_on_session(session, &prepared.ledger, &prepared.plan.pubkey).await?;
        }

        let mut armed =
            ArmedChannel::open(self.exec.as_ref(), &self.endpoint, &prepared.remote_command).await?;
        tracing::info!("SECONDARY armed");

        let result = self.fire_armed(&mut armed, prepared).await;
        armed.finish().await;
        result
    }

    async fn fire_armed(
        &self,
        armed: &mut ArmedChannel,
        prepared: &Prepared,
    ) -> Result<SwapReport, SwapError> {
        let mut child = self.spawn_local(prepared)?;
        self.trigger_delay(prepared).await;
        armed.release().await;
        tracing::info!("SECONDARY set-identity released (armed)");

        let mut report = prepared.report(Dispatch::Firedancer(SwapMode::Armed));
        report.local_wait = child.wait_bounded(prepared.local_wait()).await;
        Ok(report)
    }

    async fn dispatch_agave(
        &self,
        session: &mut RemoteSession,
        prepared: &Prepared,
    ) -> Result<SwapReport, SwapError> {
        if prepared.cleans_tower() {
            tower::cleanup_on_session(session, &prepared.ledger, &prepared.plan.pubkey).await?;
        }

        // MAIN gives up the identity before SECONDARY's result is known.
        let mut child = self.spawn_local(prepared)?;
        let mut report = prepared.report(Dispatch::Agave);
        report.local_wait = child.wait_bounded(LOCAL_WAIT_AGAVE).await;

        let (stdout, stderr) = session.run(&prepared.remote_command, true).await?;
        for (label, text) in [("stdout", stdout.trim()), ("stderr", stderr.trim())] {
            if !text.is_empty() {
                self.sink.verbose(&format!("SECONDARY {}: {}", label, text));
            }
        }
        tracing::info!("SECONDARY set-identity completed");
        Ok(report)
    }
}

/// Check clients and mode before anything touches either host. Returns the
/// Firedancer trigger mode, or `None` when SECONDARY runs Agave.
fn validate(plan: &SwapPlan) -> Result<Option<SwapMode>, SwapError> {
    let mode = match plan.remote_client {
        ClientKind::Unknown => {
            return Err(SwapError::UnknownClient {
                role: HostRole::Secondary,
            })
        }
        ClientKind::Fd => Some(SwapMode::parse(&plan.mode, ClientKind::Fd)?),
        ClientKind::Agave => None,
    };
    if plan.main_client == ClientKind::Unknown {
        return Err(SwapError::UnknownClient {
            role: HostRole::Main,
        });
    }
    Ok(mode)
}

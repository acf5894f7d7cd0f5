//! The `swap` command

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use hs_core::config::HotswapConfig;
use hs_core::traits::RemoteExec;
use hs_core::{ClientKind, SwapError};
use hs_swap::{
    check_connection, ClientDetector, PathCache, PathResolver, ScpTowerSync, SshTransport,
    SwapOrchestrator, SwapOutcome, SwapPlan, SysinfoSnapshot, TokioSpawner, WaitOutcome,
};

use super::verify::{verify_identity, IdentitySources};
use super::{apply_env, exit_code, load_settings, remote_ledger, EXIT_CANCELLED, EXIT_UNREACHABLE};
use crate::output::{
    format_identity, format_report, print_error, print_info, print_success, print_warning,
};
use crate::prompt::TerminalSink;

/// Options of `hotswap swap`
#[derive(Debug, Args)]
pub struct SwapArgs {
    /// Voting identity pubkey; skips the identity check on both hosts
    #[arg(long)]
    pub pubkey: Option<String>,

    /// Compare key files only; skip asking the running validator
    #[arg(long, conflicts_with = "pubkey")]
    pub fast: bool,

    /// Firedancer trigger mode on SECONDARY: sequential, armed or bg
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Client on MAIN (skips detection)
    #[arg(long, value_name = "AGAVE|FD")]
    pub main_client: Option<ClientKind>,

    /// Client on SECONDARY (skips detection)
    #[arg(long, value_name = "AGAVE|FD")]
    pub remote_client: Option<ClientKind>,

    /// Ledger directory on MAIN
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Staked validator key on MAIN
    #[arg(long)]
    pub validator_key: Option<PathBuf>,

    /// Unstaked identity MAIN switches to
    #[arg(long)]
    pub unstaked_identity: Option<PathBuf>,

    /// Staked validator key on SECONDARY (may use ~ or $HOME)
    #[arg(long)]
    pub remote_validator_key: Option<String>,

    /// Ledger directory on SECONDARY (may use ~ or $HOME)
    #[arg(long)]
    pub remote_ledger: Option<String>,

    /// Delay between the local spawn and the remote trigger
    #[arg(long, value_name = "MS")]
    pub trigger_delay_ms: Option<u64>,

    /// Leave tower files on SECONDARY alone
    #[arg(long)]
    pub no_tower_cleanup: bool,

    /// Do not copy MAIN's tower file to SECONDARY
    #[arg(long)]
    pub no_tower_sync: bool,

    /// `.env` file with SECONDARY ssh settings
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}

impl SwapArgs {
    /// Merge flags over the configuration
    fn plan(
        &self,
        config: &HotswapConfig,
        pubkey: String,
        main: ClientKind,
        remote: ClientKind,
    ) -> SwapPlan {
        SwapPlan {
            main_client: main,
            remote_client: remote,
            pubkey,
            main_ledger: self.main_ledger(config),
            unstaked_identity: self
                .unstaked_identity
                .clone()
                .unwrap_or_else(|| config.local.unstaked_identity.clone()),
            remote_validator_key: self.remote_validator_key(config),
            remote_ledger: self.remote_ledger(config),
            trigger_delay: self
                .trigger_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(config.swap.trigger_delay),
            mode: self.mode.clone().unwrap_or_else(|| config.swap.mode.clone()),
            cleanup_remote_tower: config.swap.cleanup_remote_tower && !self.no_tower_cleanup,
            assume_yes: self.yes,
        }
    }

    fn main_key(&self, config: &HotswapConfig) -> PathBuf {
        self.validator_key
            .clone()
            .unwrap_or_else(|| config.local.validator_key.clone())
    }

    fn remote_validator_key(&self, config: &HotswapConfig) -> String {
        self.remote_validator_key
            .clone()
            .unwrap_or_else(|| config.remote.validator_key.clone())
    }

    fn tower_sync(&self, config: &HotswapConfig) -> bool {
        config.swap.sync_tower && !self.no_tower_sync
    }

    fn main_ledger(&self, config: &HotswapConfig) -> PathBuf {
        self.ledger.clone().unwrap_or_else(|| config.local.ledger.clone())
    }

    fn remote_ledger(&self, config: &HotswapConfig) -> String {
        self.remote_ledger
            .clone()
            .unwrap_or_else(|| remote_ledger(config))
    }
}

/// Detect both clients, then run the swap
pub async fn swap_command(
    config_path: Option<&Path>,
    args: &SwapArgs,
    verbose: bool,
) -> Result<ExitCode> {
    let mut config = load_settings(config_path)?;
    apply_env(&mut config, args.env_file.as_deref())?;
    let endpoint = config.secondary.clone();

    let exec: Arc<dyn RemoteExec> = Arc::new(SshTransport::new());
    if let Err(e) = check_connection(exec.as_ref(), &endpoint).await {
        print_error(&format!("SECONDARY unreachable: {}", e));
        return Ok(exit_code(EXIT_UNREACHABLE));
    }

    let detector = ClientDetector::new(Arc::clone(&exec), Arc::new(SysinfoSnapshot::new()));
    let main = match args.main_client {
        Some(kind) => kind,
        None => {
            let ledger = args.main_ledger(&config).to_string_lossy().into_owned();
            detector.detect_local(Some(ledger.as_str())).await?
        }
    };
    let remote = match args.remote_client {
        Some(kind) => kind,
        None => {
            let ledger = args.remote_ledger(&config);
            detector
                .detect_remote_with_fallback(&endpoint, Some(ledger.as_str()))
                .await?
        }
    };
    print_info(&format!("MAIN: {}  SECONDARY: {} ({})", main, remote, endpoint));

    let resolver = PathResolver::new(Arc::clone(&exec), PathCache::new());
    let pubkey = match &args.pubkey {
        Some(pubkey) => {
            print_warning("--pubkey given; identity check on both hosts skipped");
            pubkey.clone()
        }
        None => {
            let main_ledger = args.main_ledger(&config);
            let main_key = args.main_key(&config);
            let remote_key = args.remote_validator_key(&config);
            let sources = IdentitySources {
                main_ledger: &main_ledger,
                main_key: &main_key,
                remote_key: &remote_key,
                fast: args.fast,
            };
            match verify_identity(&config, Arc::clone(&exec), resolver.clone(), sources).await {
                Ok(report) => {
                    println!("{}", format_identity(&report));
                    report.voting().to_string()
                }
                Err(e) => {
                    print_error(&format!("Identity check failed: {}", e));
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    };

    let plan = args.plan(&config, pubkey, main, remote);
    let mut orchestrator = SwapOrchestrator::new(
        exec,
        Arc::new(TokioSpawner),
        resolver,
        endpoint,
        config.local.install(),
        config.remote.install(),
    )
    .with_sink(Arc::new(TerminalSink::new(verbose)));
    if args.tower_sync(&config) {
        orchestrator = orchestrator.with_tower_sync(Arc::new(ScpTowerSync::new()));
    }

    match orchestrator.execute(plan).await {
        Ok(SwapOutcome::Completed(report)) => {
            print!("{}", format_report(&report));
            if report.local_wait == WaitOutcome::StillRunning {
                print_warning("MAIN set-identity has not exited yet; verify with the validator's monitor");
            }
            print_success("Swap complete");
            Ok(ExitCode::SUCCESS)
        }
        Ok(SwapOutcome::Cancelled) => {
            print_warning("Swap cancelled; nothing was changed");
            Ok(exit_code(EXIT_CANCELLED))
        }
        Err(e) => {
            print_error(&format!("Swap failed: {}", e));
            if let SwapError::RemoteCommand { stdout, stderr, .. } = &e {
                for text in [stdout.trim(), stderr.trim()] {
                    if !text.is_empty() {
                        eprintln!("{}", text);
                    }
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

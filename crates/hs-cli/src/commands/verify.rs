//! The `verify` command and the identity check shared with `swap`

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use hs_core::config::HotswapConfig;
use hs_core::traits::RemoteExec;
use hs_core::SwapError;
use hs_swap::{
    check_connection, IdentityReport, IdentityVerifier, PathCache, PathResolver, SshTransport,
    TokioSpawner,
};

use super::{apply_env, exit_code, load_settings, EXIT_UNREACHABLE};
use crate::output::{format_identity, print_error, print_success};

/// Options of `hotswap verify`
#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Compare key files only; skip asking the running validator
    #[arg(long)]
    pub fast: bool,

    /// Ledger directory on MAIN
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Staked validator key on MAIN
    #[arg(long)]
    pub validator_key: Option<PathBuf>,

    /// Staked validator key on SECONDARY (may use ~ or $HOME)
    #[arg(long)]
    pub remote_validator_key: Option<String>,

    /// `.env` file with SECONDARY ssh settings
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}

/// Key files and ledger the identity check reads
pub(super) struct IdentitySources<'a> {
    pub main_ledger: &'a Path,
    pub main_key: &'a Path,
    pub remote_key: &'a str,
    pub fast: bool,
}

/// Confirm both key files hold the identity MAIN votes with
pub(super) async fn verify_identity(
    config: &HotswapConfig,
    exec: Arc<dyn RemoteExec>,
    resolver: PathResolver,
    sources: IdentitySources<'_>,
) -> Result<IdentityReport, SwapError> {
    let verifier = IdentityVerifier::new(
        exec,
        Arc::new(TokioSpawner),
        resolver,
        config.secondary.clone(),
        config.local.install().agave_cli,
    );
    verifier
        .verify(
            sources.main_ledger,
            sources.main_key,
            sources.remote_key,
            sources.fast,
        )
        .await
}

/// Check the identity on both hosts without swapping
pub async fn verify_command(config_path: Option<&Path>, args: &VerifyArgs) -> Result<ExitCode> {
    let mut config = load_settings(config_path)?;
    apply_env(&mut config, args.env_file.as_deref())?;

    let exec: Arc<dyn RemoteExec> = Arc::new(SshTransport::new());
    if let Err(e) = check_connection(exec.as_ref(), &config.secondary).await {
        print_error(&format!("SECONDARY unreachable: {}", e));
        return Ok(exit_code(EXIT_UNREACHABLE));
    }

    let main_ledger = args.ledger.clone().unwrap_or_else(|| config.local.ledger.clone());
    let main_key = args
        .validator_key
        .clone()
        .unwrap_or_else(|| config.local.validator_key.clone());
    let remote_key = args
        .remote_validator_key
        .clone()
        .unwrap_or_else(|| config.remote.validator_key.clone());

    let resolver = PathResolver::new(Arc::clone(&exec), PathCache::new());
    let sources = IdentitySources {
        main_ledger: &main_ledger,
        main_key: &main_key,
        remote_key: &remote_key,
        fast: args.fast,
    };
    match verify_identity(&config, exec, resolver, sources).await {
        Ok(report) => {
            println!("{}", format_identity(&report));
            print_success(&format!("Both hosts hold {}", report.voting()));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_error(&format!("Identity check failed: {}", e));
            Ok(ExitCode::FAILURE)
        }
    }
}

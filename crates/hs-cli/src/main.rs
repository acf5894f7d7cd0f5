//! validator-hotswap CLI
//!
//! Moves the staked voting identity from this host (MAIN) to a standby
//! host (SECONDARY) with minimal downtime.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hs_cli::commands::{self, SwapArgs, VerifyArgs};
use hs_cli::output::print_error;

#[derive(Parser)]
#[command(name = "hotswap")]
#[command(author, version, about = "Validator identity hot-swap between two hosts")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move the staked identity from MAIN to SECONDARY
    Swap(SwapArgs),

    /// Check that both hosts hold the identity MAIN votes with
    Verify(VerifyArgs),

    /// Show which validator client runs on each host
    Detect {
        /// Ledger directory on MAIN
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Ledger directory on SECONDARY
        #[arg(long)]
        remote_ledger: Option<String>,
        /// `.env` file with SECONDARY ssh settings
        #[arg(long)]
        env_file: Option<PathBuf>,
    },

    /// Check that SECONDARY is reachable over ssh
    Check {
        /// `.env` file with SECONDARY ssh settings
        #[arg(long)]
        env_file: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Swap(args) => commands::swap_command(config, &args, cli.verbose > 0).await,

        Commands::Verify(args) => commands::verify_command(config, &args).await,

        Commands::Detect {
            ledger,
            remote_ledger,
            env_file,
        } => {
            commands::detect_command(
                config,
                env_file.as_deref(),
                ledger.as_deref(),
                remote_ledger.as_deref(),
            )
            .await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Check { env_file } => commands::check_command(config, env_file.as_deref()).await,

        Commands::Config { action } => {
            match action {
                ConfigAction::Show => commands::config_show(config)?,
                ConfigAction::Path => commands::config_path(config),
                ConfigAction::Init { force } => commands::config_init(config, force)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

//! hs-swap: Swap orchestration engine for validator-hotswap
//!
//! This crate moves a staked validator identity from the local host (MAIN)
//! to a remote standby (SECONDARY):
//! - ssh transport and persistent remote sessions
//! - remote path resolution with a per-host cache
//! - local and remote validator client detection
//! - voting identity checks on both hosts
//! - set-identity command construction
//! - tower file migration and cleanup
//! - the three-mode swap state machine

pub mod command;
pub mod detect;
pub mod identity;
pub mod paths;
pub mod session;
pub mod ssh;
pub mod supervise;
pub mod swap;
pub mod tower;

#[cfg(test)]
pub(crate) mod testing;

pub use command::CommandBuilder;
pub use detect::{ClientDetector, RemoteProcSnapshot, SysinfoSnapshot};
pub use identity::{IdentityReport, IdentityVerifier};
pub use paths::{PathCache, PathResolver};
pub use session::{ArmedChannel, RemoteSession};
pub use ssh::{build_scp_args, check_connection, SshTransport};
pub use supervise::{SupervisedChild, TokioSpawner, WaitOutcome};
pub use swap::{Dispatch, SwapMode, SwapOrchestrator, SwapOutcome, SwapPlan, SwapReport, TowerAction};
pub use tower::ScpTowerSync;

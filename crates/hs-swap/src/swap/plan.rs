//! Swap parameters and results

use std::path::PathBuf;
use std::time::Duration;

use hs_core::traits::PlanEntry;
use hs_core::ClientKind;

use crate::supervise::WaitOutcome;
use super::mode::SwapMode;

/// Everything one swap needs, built right before it runs
#[derive(Debug, Clone)]
pub struct SwapPlan {
    pub main_client: ClientKind,
    pub remote_client: ClientKind,
    /// Voting identity pubkey whose tower files are handled
    pub pubkey: String,
    pub main_ledger: PathBuf,
    /// Identity MAIN switches to
    pub unstaked_identity: PathBuf,
    /// Staked key SECONDARY switches to, unresolved
    pub remote_validator_key: String,
    /// Ledger on SECONDARY, unresolved
    pub remote_ledger: String,
    pub trigger_delay: Duration,
    /// Mode as given; validated only when SECONDARY runs Firedancer
    pub mode: String,
    pub cleanup_remote_tower: bool,
    pub assume_yes: bool,
}

/// How the tower on SECONDARY was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TowerAction {
    /// Copied from MAIN; cleanup skipped
    Migrated,
    /// Stale files deleted
    Cleaned,
    /// Cleanup disabled
    Skipped,
}

/// Path the swap took on SECONDARY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Firedancer(SwapMode),
    Agave,
}

/// Report of a completed swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReport {
    pub dispatch: Dispatch,
    pub tower: TowerAction,
    pub local_wait: WaitOutcome,
    /// Result of the post-exec poll in sequential Firedancer mode
    pub remote_status: Option<String>,
    pub remote_command: String,
    pub local_command: Vec<String>,
}

/// Final state of a swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    Completed(SwapReport),
    /// The operator declined; nothing was changed
    Cancelled,
}

impl SwapPlan {
    /// Rows shown at the confirmation gate
    pub fn entries(&self, mode: Option<SwapMode>) -> Vec<PlanEntry> {
        let mut entries = vec![
            PlanEntry::new("MAIN client", self.main_client.to_string()),
            PlanEntry::new("SECONDARY client", self.remote_client.to_string()),
            PlanEntry::new("Voting pubkey", &self.pubkey),
            PlanEntry::new("MAIN ledger", self.main_ledger.display().to_string()),
            PlanEntry::new("SECONDARY ledger", &self.remote_ledger),
            PlanEntry::new(
                "MAIN -> set-identity",
                format!("{} (unstaked)", self.unstaked_identity.display()),
            ),
            PlanEntry::new(
                "SECONDARY -> set-identity",
                format!("{} (validator)", self.remote_validator_key),
            ),
        ];
        if let Some(mode) = mode {
            entries.push(PlanEntry::new("FD mode", mode.to_string()));
        }
        entries
    }
}

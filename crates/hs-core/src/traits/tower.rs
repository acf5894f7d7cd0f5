//! Tower migration hook

use async_trait::async_trait;

use crate::error::SwapError;
use crate::types::Endpoint;

/// Copies the current tower file from MAIN to SECONDARY before a swap.
///
/// When a copy succeeds the remote tower cleanup is skipped.
#[async_trait]
pub trait TowerSync: Send + Sync {
    /// Returns `true` when the tower was copied
    async fn migrate(
        &self,
        pubkey: &str,
        main_ledger: &str,
        secondary: &Endpoint,
        remote_ledger: &str,
    ) -> Result<bool, SwapError>;
}

/// Never migrates; the remote tower is always cleaned instead
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTowerSync;

#[async_trait]
impl TowerSync for NoTowerSync {
    async fn migrate(
        &self,
        _pubkey: &str,
        _main_ledger: &str,
        _secondary: &Endpoint,
        _remote_ledger: &str,
    ) -> Result<bool, SwapError> {
        Ok(false)
    }
}

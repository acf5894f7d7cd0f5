//! set-identity command construction

use hs_core::config::InstallPaths;
use hs_core::{ClientKind, Endpoint, HostRole, SwapError};

use crate::paths::PathResolver;

/// Builds the set-identity command for one host
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    role: HostRole,
    install: InstallPaths,
}

impl CommandBuilder {
    pub fn new(role: HostRole, install: InstallPaths) -> Self {
        Self { role, install }
    }

    /// Argument vector for `kind`, from already resolved paths
    pub fn build_argv(
        &self,
        kind: ClientKind,
        ledger: &str,
        key: &str,
    ) -> Result<Vec<String>, SwapError> {
        self.argv_with(kind, &self.install, ledger, key)
    }

    /// Shell command line for `kind`, every token quoted as needed
    pub fn build(&self, kind: ClientKind, ledger: &str, key: &str) -> Result<String, SwapError> {
        Ok(shell_words::join(self.build_argv(kind, ledger, key)?))
    }

    /// Resolve install paths, ledger and key on the remote host, then build
    pub async fn build_remote(
        &self,
        resolver: &PathResolver,
        endpoint: &Endpoint,
        kind: ClientKind,
        ledger: &str,
        key: &str,
    ) -> Result<String, SwapError> {
        let mut install = self.install.clone();
        let mut resolved_ledger = ledger.to_string();
        match kind {
            ClientKind::Agave => {
                install.agave_cli = resolver.resolve(endpoint, &self.install.agave_cli).await?;
                resolved_ledger = resolver.resolve(endpoint, ledger).await?;
            }
            ClientKind::Fd => {
                install.fdctl = resolver.resolve(endpoint, &self.install.fdctl).await?;
                install.fd_config = resolver.resolve(endpoint, &self.install.fd_config).await?;
            }
            ClientKind::Unknown => return Err(SwapError::UnknownClient { role: self.role }),
        }
        let key = resolver.resolve(endpoint, key).await?;
        Ok(shell_words::join(self.argv_with(kind, &install, &resolved_ledger, &key)?))
    }

    fn argv_with(
        &self,
        kind: ClientKind,
        install: &InstallPaths,
        ledger: &str,
        key: &str,
    ) -> Result<Vec<String>, SwapError> {
        let argv = match kind {
            ClientKind::Agave => vec![
                install.agave_cli.clone(),
                "--ledger".to_string(),
                ledger.to_string(),
                "set-identity".to_string(),
                key.to_string(),
            ],
            ClientKind::Fd => vec![
                install.fdctl.clone(),
                "set-identity".to_string(),
                "--config".to_string(),
                install.fd_config.clone(),
                key.to_string(),
                "--force".to_string(),
            ],
            ClientKind::Unknown => return Err(SwapError::UnknownClient { role: self.role }),
        };
        Ok(argv)
    }
}

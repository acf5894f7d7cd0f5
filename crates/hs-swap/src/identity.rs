//! Voting identity checks
//!
//! Before a swap the staked key on both hosts must be the identity MAIN is
//! voting with. The pubkey confirmed here also names the tower files handled
//! during the swap.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hs_core::config::expand_home;
use hs_core::traits::{LocalExec, RemoteExec, RunOptions};
use hs_core::{Endpoint, HostRole, SwapError};

use crate::paths::PathResolver;

/// Keygen binaries tried in order before `solana address -k`
pub const KEYGEN_PROGRAMS: &[&str] = &["solana-keygen", "agave-keygen"];

/// Line of `agave-validator monitor` output carrying the identity
const MONITOR_PREFIX: &str = "Identity:";

/// How long `monitor` may take to print its header
const MONITOR_WAIT: Duration = Duration::from_secs(3);

const KEYGEN_TIMEOUT: Duration = Duration::from_secs(15);

const KEY_READABLE: &str = "OK";

/// Pubkeys gathered by [`IdentityVerifier::verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityReport {
    /// Identity reported by the running validator; `None` in fast mode
    pub running: Option<String>,
    /// Pubkey of the staked key file on MAIN
    pub main_key: String,
    /// Pubkey of the staked key file on SECONDARY
    pub secondary_key: String,
}

impl IdentityReport {
    /// The voting pubkey the swap moves
    pub fn voting(&self) -> &str {
        self.running.as_deref().unwrap_or(&self.main_key)
    }

    /// Both key files must hold the voting identity
    pub fn check(&self) -> Result<(), SwapError> {
        let voting = self.voting();
        for (role, key) in [
            (HostRole::Main, &self.main_key),
            (HostRole::Secondary, &self.secondary_key),
        ] {
            if key != voting {
                return Err(SwapError::IdentityMismatch {
                    role,
                    voting: voting.to_string(),
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Reads pubkeys from key files on both hosts and the identity of the
/// running validator on MAIN
pub struct IdentityVerifier {
    exec: Arc<dyn RemoteExec>,
    local: Arc<dyn LocalExec>,
    resolver: PathResolver,
    endpoint: Endpoint,
    agave_cli: String,
}

impl IdentityVerifier {
    /// `agave_cli` is the local `agave-validator` used for `monitor`
    pub fn new(
        exec: Arc<dyn RemoteExec>,
        local: Arc<dyn LocalExec>,
        resolver: PathResolver,
        endpoint: Endpoint,
        agave_cli: impl Into<String>,
    ) -> Self {
        Self {
            exec,
            local,
            resolver,
            endpoint,
            agave_cli: agave_cli.into(),
        }
    }

    /// Derive both key pubkeys and, unless `fast`, the running identity,
    /// then require them to agree.
    pub async fn verify(
        &self,
        main_ledger: &Path,
        main_key: &Path,
        remote_key: &str,
        fast: bool,
    ) -> Result<IdentityReport, SwapError> {
        let running = if fast {
            None
        } else {
            Some(self.running_identity(main_ledger).await?)
        };
        let report = IdentityReport {
            running,
            main_key: self.local_pubkey(main_key).await?,
            secondary_key: self.remote_pubkey(remote_key).await?,
        };
        tracing::info!(
            "Identity: running {:?}, MAIN key {}, SECONDARY key {}",
            report.running,
            report.main_key,
            report.secondary_key
        );
        report.check()?;
        Ok(report)
    }

    /// Identity the local validator votes with, from `agave-validator monitor`
    pub async fn running_identity(&self, ledger: &Path) -> Result<String, SwapError> {
        let argv = vec![
            self.agave_cli.clone(),
            "--ledger".to_string(),
            expand_home(ledger).to_string_lossy().into_owned(),
            "monitor".to_string(),
        ];
        let line = self
            .local
            .scan_line(&argv, MONITOR_PREFIX, MONITOR_WAIT)
            .await
            .map_err(|e| SwapError::IdentityUnavailable {
                detail: e.to_string(),
            })?;
        line.as_deref()
            .and_then(parse_pubkey)
            .ok_or_else(|| SwapError::IdentityUnavailable {
                detail: format!("no {:?} line within {:?}", MONITOR_PREFIX, MONITOR_WAIT),
            })
    }

    /// Pubkey of a key file on MAIN
    pub async fn local_pubkey(&self, key: &Path) -> Result<String, SwapError> {
        let key = expand_home(key).to_string_lossy().into_owned();

        let mut attempts: Vec<Vec<String>> = KEYGEN_PROGRAMS
            .iter()
            .map(|p| vec![p.to_string(), "pubkey".to_string(), key.clone()])
            .collect();
        attempts.push(vec![
            "solana".to_string(),
            "address".to_string(),
            "-k".to_string(),
            key.clone(),
        ]);
        // profile PATH, for cron and systemd environments
        attempts.push(vec!["bash".to_string(), "-lc".to_string(), keygen_script(&key)]);

        let mut detail = "no keygen found".to_string();
        for argv in attempts {
            match self.local.output(&argv, KEYGEN_TIMEOUT).await {
                Ok(out) => {
                    if out.success() {
                        if let Some(pubkey) = parse_pubkey(&out.stdout) {
                            return Ok(pubkey);
                        }
                    }
                    if !out.stderr.trim().is_empty() {
                        detail = out.stderr.trim().to_string();
                    }
                }
                Err(SwapError::Spawn { program, source }) => {
                    tracing::debug!("{} unavailable: {}", program, source);
                }
                Err(e) => detail = e.to_string(),
            }
        }
        Err(SwapError::KeyUnavailable {
            role: HostRole::Main,
            path: key,
            detail,
        })
    }

    /// Pubkey of a key file on SECONDARY; `raw` may use `~` or `$HOME`
    pub async fn remote_pubkey(&self, raw: &str) -> Result<String, SwapError> {
        let key = self.resolver.resolve(&self.endpoint, raw).await?;
        let unavailable = |detail: String| SwapError::KeyUnavailable {
            role: HostRole::Secondary,
            path: key.clone(),
            detail,
        };

        let check = format!(
            "[ -r {} ] && echo {} || echo NO_KEY",
            shell_words::quote(&key),
            KEY_READABLE
        );
        let readable = self
            .exec
            .run_once(&self.endpoint, &check, RunOptions::plain().with_timeout(KEYGEN_TIMEOUT))
            .await?;
        if readable.stdout_trimmed() != KEY_READABLE {
            return Err(unavailable("not readable".to_string()));
        }

        let out = self
            .exec
            .run_once(
                &self.endpoint,
                &keygen_script(&key),
                RunOptions::login().with_timeout(KEYGEN_TIMEOUT),
            )
            .await?;
        parse_pubkey(&out.stdout).ok_or_else(|| {
            unavailable(match out.stderr.trim() {
                "" => "no solana-keygen, agave-keygen or solana found".to_string(),
                err => err.to_string(),
            })
        })
    }
}

/// Shell snippet printing the pubkey of `key` with whichever keygen is
/// installed
pub fn keygen_script(key: &str) -> String {
    let key = shell_words::quote(key);
    format!(
        "for k in {} \"$HOME/.local/share/solana/install/active_release/bin/solana-keygen\"; do \
         command -v \"$k\" >/dev/null 2>&1 && \"$k\" pubkey {key} && exit 0; done; \
         command -v solana >/dev/null 2>&1 && solana address -k {key}",
        KEYGEN_PROGRAMS.join(" "),
    )
}

/// Last non-empty line of `stdout` when it looks like a base58 pubkey
pub fn parse_pubkey(stdout: &str) -> Option<String> {
    let line = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    let base58 = line
        .chars()
        .all(|c| c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l'));
    ((32..=44).contains(&line.len()) && base58).then(|| line.to_string())
}

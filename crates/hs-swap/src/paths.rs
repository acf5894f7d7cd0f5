//! Remote path resolution
//!
//! Remote paths in configuration may use `~` or `$VARS`. They are expanded
//! and canonicalized on the remote host itself, once per host and raw
//! string.

use dashmap::DashMap;
use std::sync::Arc;

use hs_core::traits::{RemoteExec, RunOptions};
use hs_core::{Endpoint, EndpointKey, SwapError};

/// Environment variable carrying the raw path to the remote interpreter
pub const RAW_PATH_VAR: &str = "HS_RAW_PATH";

const EXPAND_SCRIPT: &str = "import os; p = os.environ['HS_RAW_PATH']; \
print(os.path.realpath(os.path.expanduser(os.path.expandvars(p))))";

/// Shared cache of resolved remote paths
#[derive(Debug, Clone, Default)]
pub struct PathCache {
    entries: Arc<DashMap<(EndpointKey, String), String>>,
}

impl PathCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a resolved path
    pub fn get(&self, key: &EndpointKey, raw: &str) -> Option<String> {
        self.entries
            .get(&(key.clone(), raw.to_string()))
            .map(|r| r.value().clone())
    }

    /// Record a resolved path
    pub fn insert(&self, key: EndpointKey, raw: impl Into<String>, resolved: impl Into<String>) {
        self.entries.insert((key, raw.into()), resolved.into());
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Expands and canonicalizes paths on the remote host
#[derive(Clone)]
pub struct PathResolver {
    exec: Arc<dyn RemoteExec>,
    cache: PathCache,
}

impl PathResolver {
    /// Create a resolver over `exec` with the given cache
    pub fn new(exec: Arc<dyn RemoteExec>, cache: PathCache) -> Self {
        Self { exec, cache }
    }

    /// The cache backing this resolver
    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    /// Resolve `raw` to an absolute canonical path on `endpoint`.
    ///
    /// One round trip on a cache miss, none on a hit.
    pub async fn resolve(&self, endpoint: &Endpoint, raw: &str) -> Result<String, SwapError> {
        let key = endpoint.key();
        if let Some(hit) = self.cache.get(&key, raw) {
            return Ok(hit);
        }

        let output = self
            .exec
            .run_once(endpoint, &expand_command(raw), RunOptions::plain())
            .await
            .map_err(|e| SwapError::PathResolution {
                path: raw.to_string(),
                detail: e.to_string(),
            })?;

        let resolved = output.stdout_trimmed();
        if !output.success() || resolved.is_empty() {
            let detail = match output.stderr.trim() {
                "" => format!("exit status {}, no output", output.exit_code),
                err => err.to_string(),
            };
            return Err(SwapError::PathResolution {
                path: raw.to_string(),
                detail,
            });
        }

        tracing::debug!("resolved {} -> {} on {}", raw, resolved, endpoint.host);
        self.cache.insert(key, raw, resolved);
        Ok(resolved.to_string())
    }
}

/// Remote command expanding `raw`. The raw string travels as a quoted
/// environment assignment, so the shell never evaluates it.
pub fn expand_command(raw: &str) -> String {
    format!(
        "{}={} python3 -c {}",
        RAW_PATH_VAR,
        shell_words::quote(raw),
        shell_words::quote(EXPAND_SCRIPT)
    )
}

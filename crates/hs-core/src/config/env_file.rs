//! `.env` overrides for the secondary endpoint
//!
//! Lookup order per key: process environment, then the file, then whatever
//! the endpoint already holds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::Endpoint;

/// Keys understood in the `.env` file
pub const ENV_KEYS: &[&str] = &[
    "SSH_HOST",
    "SSH_USER",
    "SSH_PORT",
    "SSH_IDENTITY_FILE",
    "SSH_STRICT_HOST_KEY_CHECKING",
    "SSH_CONNECT_TIMEOUT",
    "SSH_SERVER_ALIVE_INTERVAL",
    "SSH_SERVER_ALIVE_COUNT_MAX",
];

/// Read a `.env` file. A missing file yields an empty map.
///
/// Parsing follows dotenv conventions: `export` prefixes, quoting and
/// comments are handled by `dotenvy`. Nothing is written to the process
/// environment.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };

    let vars = iter.collect::<Result<HashMap<_, _>, _>>()?;
    tracing::debug!("{} keys read from {:?}", vars.len(), path);
    Ok(vars)
}

/// Apply `.env`-style overrides to an endpoint.
///
/// `process_env` is consulted before `file_vars`; pass
/// `|k| std::env::var(k).ok()` in production.
pub fn apply_env_overrides<F>(
    endpoint: &mut Endpoint,
    file_vars: &HashMap<String, String>,
    process_env: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| process_env(key).or_else(|| file_vars.get(key).cloned());

    if let Some(host) = get("SSH_HOST") {
        endpoint.host = host;
    }
    if let Some(user) = get("SSH_USER") {
        endpoint.user = user;
    }
    if let Some(port) = get("SSH_PORT") {
        endpoint.port = parse_number("SSH_PORT", &port)?;
    }
    if let Some(identity) = get("SSH_IDENTITY_FILE") {
        endpoint.identity_file = Some(super::expand_home(&PathBuf::from(identity)));
    }
    if let Some(policy) = get("SSH_STRICT_HOST_KEY_CHECKING") {
        endpoint.strict_host_key_checking = policy.parse().map_err(ConfigError::Invalid)?;
    }
    if let Some(secs) = get("SSH_CONNECT_TIMEOUT") {
        endpoint.connect_timeout = Duration::from_secs(parse_number("SSH_CONNECT_TIMEOUT", &secs)?);
    }
    if let Some(secs) = get("SSH_SERVER_ALIVE_INTERVAL") {
        endpoint.server_alive_interval =
            Duration::from_secs(parse_number("SSH_SERVER_ALIVE_INTERVAL", &secs)?);
    }
    if let Some(count) = get("SSH_SERVER_ALIVE_COUNT_MAX") {
        endpoint.server_alive_count_max = parse_number("SSH_SERVER_ALIVE_COUNT_MAX", &count)?;
    }

    if endpoint.host.is_empty() {
        return Err(ConfigError::MissingField("SSH_HOST".to_string()));
    }
    tracing::debug!("SECONDARY endpoint: {}", endpoint);
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got {:?}", key, value)))
}

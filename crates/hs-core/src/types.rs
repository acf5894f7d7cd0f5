//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::config::serde_utils::duration_secs;

/// Validator implementation running on a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClientKind {
    /// Agave (`agave-validator` / `solana-validator`)
    Agave,
    /// Firedancer (`fdctl` / `firedancer`)
    Fd,
    /// Neither implementation was observed
    Unknown,
}

impl ClientKind {
    /// Whether this is one of the two known implementations
    pub fn is_known(&self) -> bool {
        !matches!(self, ClientKind::Unknown)
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKind::Agave => write!(f, "AGAVE"),
            ClientKind::Fd => write!(f, "FD"),
            ClientKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for ClientKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "agave" => Ok(ClientKind::Agave),
            "fd" | "firedancer" => Ok(ClientKind::Fd),
            "unknown" => Ok(ClientKind::Unknown),
            other => Err(format!("unknown client '{}' (use AGAVE|FD)", other)),
        }
    }
}

/// Which side of the swap a host is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRole {
    /// The local host, currently holding the staked identity
    Main,
    /// The remote standby host
    Secondary,
}

impl fmt::Display for HostRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostRole::Main => write!(f, "MAIN"),
            HostRole::Secondary => write!(f, "SECONDARY"),
        }
    }
}

/// ssh `StrictHostKeyChecking` policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Refuse unknown host keys
    Yes,
    /// Accept any host key
    No,
    /// Record unknown keys, refuse changed ones
    #[default]
    AcceptNew,
}

impl HostKeyPolicy {
    /// Value as passed to `-o StrictHostKeyChecking=`
    pub fn as_str(&self) -> &'static str {
        match self {
            HostKeyPolicy::Yes => "yes",
            HostKeyPolicy::No => "no",
            HostKeyPolicy::AcceptNew => "accept-new",
        }
    }
}

impl FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(HostKeyPolicy::Yes),
            "no" => Ok(HostKeyPolicy::No),
            "accept-new" => Ok(HostKeyPolicy::AcceptNew),
            other => Err(format!(
                "invalid StrictHostKeyChecking '{}' (use yes|no|accept-new)",
                other
            )),
        }
    }
}

/// Connection settings for the remote host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    /// Hostname or address
    pub host: String,

    /// Login user
    pub user: String,

    /// ssh port
    pub port: u16,

    /// Private key passed with `-i`
    pub identity_file: Option<PathBuf>,

    /// Host key verification policy
    pub strict_host_key_checking: HostKeyPolicy,

    /// ssh `ConnectTimeout`
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// ssh `ServerAliveInterval`
    #[serde(with = "duration_secs")]
    pub server_alive_interval: Duration,

    /// ssh `ServerAliveCountMax`
    pub server_alive_count_max: u32,

    /// Extra `-o` options, e.g. `Ciphers=aes128-gcm@openssh.com`
    pub extra_options: Vec<String>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: whoami::username(),
            port: 22,
            identity_file: dirs::home_dir().map(|h| h.join(".ssh").join("id_ed25519")),
            strict_host_key_checking: HostKeyPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            server_alive_interval: Duration::from_secs(30),
            server_alive_count_max: 3,
            extra_options: vec![],
        }
    }
}

impl Endpoint {
    /// Create an endpoint with default transport settings
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// `user@host` destination for ssh
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Identity used for caching per-host results
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            host: self.host.clone(),
            user: self.user.clone(),
            port: self.port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Cache identity of an [`Endpoint`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub host: String,
    pub user: String,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_kind_parse_is_case_insensitive() {
        assert_eq!("agave".parse::<ClientKind>().unwrap(), ClientKind::Agave);
        assert_eq!("AGAVE".parse::<ClientKind>().unwrap(), ClientKind::Agave);
        assert_eq!("Fd".parse::<ClientKind>().unwrap(), ClientKind::Fd);
        assert!("lighthouse".parse::<ClientKind>().is_err());
    }

    #[test]
    fn test_client_kind_display() {
        assert_eq!(ClientKind::Agave.to_string(), "AGAVE");
        assert_eq!(ClientKind::Fd.to_string(), "FD");
        assert_eq!(ClientKind::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_endpoint_key_ignores_transport_options() {
        let a = Endpoint::new("10.0.0.2", "solana");
        let mut b = a.clone();
        b.connect_timeout = Duration::from_secs(99);
        b.extra_options.push("Compression=yes".into());
        assert_eq!(a.key(), b.key());

        let mut c = a.clone();
        c.port = 2222;
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_endpoint_toml_defaults() {
        let endpoint: Endpoint = toml::from_str(
            r#"
            host = "backup.example"
            user = "sol"
            connect_timeout = 5
            strict_host_key_checking = "yes"
            "#,
        )
        .unwrap();
        assert_eq!(endpoint.port, 22);
        assert_eq!(endpoint.connect_timeout, Duration::from_secs(5));
        assert_eq!(endpoint.strict_host_key_checking, HostKeyPolicy::Yes);
        assert_eq!(endpoint.destination(), "sol@backup.example");
    }
}

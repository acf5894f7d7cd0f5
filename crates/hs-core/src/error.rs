//! Core error types for validator-hotswap

use hs_protocol::ProtocolError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{ClientKind, HostRole};

/// Errors raised by the swap engine and its components
#[derive(Error, Debug)]
pub enum SwapError {
    /// Remote path expansion failed or printed nothing
    #[error("Failed to resolve path {path:?} on remote host: {detail}")]
    PathResolution { path: String, detail: String },

    /// A synchronous remote command returned non-zero
    #[error("Remote command failed (rc={exit_code})\nOUT:\n{stdout}\nERR:\n{stderr}")]
    RemoteCommand {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// A command was requested for an unclassified client
    #[error("[{role}] unknown validator client")]
    UnknownClient { role: HostRole },

    /// Swap mode not supported for the remote client
    #[error("Unsupported swap mode '{mode}' for remote {client} (use {accepted})")]
    InvalidMode {
        mode: String,
        client: ClientKind,
        accepted: &'static str,
    },

    /// Tower files still present after the delete pass
    #[error("Tower cleanup incomplete: {remaining} file(s) left in {dir}")]
    CleanupIncomplete { dir: String, remaining: usize },

    /// Initial reachability check failed
    #[error("Connection to {host} failed: {detail}")]
    Connection { host: String, detail: String },

    /// The remote channel ended before reporting a status
    #[error("Remote channel closed before command completed")]
    ChannelClosed { stdout: String },

    /// A previous command on this session failed
    #[error("Remote session is unusable after a failed command")]
    SessionPoisoned,

    /// Background trigger did not echo its acknowledgement
    #[error("Background trigger not acknowledged, got: {output:?}")]
    MissingAck { output: String },

    /// A key file does not hold the identity the validator votes with
    #[error("[{role}] key {key} does not match voting identity {voting}")]
    IdentityMismatch {
        role: HostRole,
        voting: String,
        key: String,
    },

    /// No pubkey could be derived from a key file
    #[error("[{role}] could not read pubkey from {path}: {detail}")]
    KeyUnavailable {
        role: HostRole,
        path: String,
        detail: String,
    },

    /// The running validator did not report its identity
    #[error("Could not read the running identity on MAIN: {detail}")]
    IdentityUnavailable { detail: String },

    /// A bounded local command did not finish in time
    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    /// A remote helper printed something other than its report line
    #[error("Unexpected output from {what}: {output:?}")]
    UnexpectedOutput { what: &'static str, output: String },

    /// A local or ssh process could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Protocol error on a session channel
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Unreadable or malformed `.env` file
    #[error("Env file error: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

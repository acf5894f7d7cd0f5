//! hs-core: Core abstractions and configuration for validator-hotswap
//!
//! This crate provides the shared domain types, the error taxonomy, the
//! configuration structures and the collaborator traits (remote execution,
//! local processes, process snapshots, operator interaction) used by the
//! swap engine and the CLI.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{ConfigError, SwapError};
pub use types::{ClientKind, Endpoint, EndpointKey, HostKeyPolicy, HostRole};

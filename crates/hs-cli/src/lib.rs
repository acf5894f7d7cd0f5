//! hs-cli: Command-line interface for validator-hotswap
//!
//! Provides the `hotswap` binary: client detection, reachability checks,
//! configuration management and the swap itself.

pub mod commands;
pub mod output;
pub mod prompt;

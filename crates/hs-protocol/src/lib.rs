//! hs-protocol: Command/status protocol for persistent remote shells
//!
//! A remote session is a plain interactive shell reached over ssh. This crate
//! turns that text channel into an explicit request/response protocol:
//! each request is a command line followed by a status suffix, and each
//! response is a run of output lines terminated by a status frame carrying
//! the command's exit code.

pub mod codec;
pub mod error;
pub mod frame;
pub mod marker;

pub use codec::{SessionCodec, MAX_LINE_LENGTH};
pub use error::ProtocolError;
pub use frame::{SessionFrame, SessionRequest};
pub use marker::StatusMarker;

//! Protocol error types

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Errors that can occur while framing a remote shell channel
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A single output line exceeded the decoder limit
    #[error("Output line too long: exceeds {max} bytes")]
    LineTooLong { max: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LinesCodecError> for ProtocolError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => ProtocolError::LineTooLong {
                max: crate::codec::MAX_LINE_LENGTH,
            },
            LinesCodecError::Io(e) => ProtocolError::Io(e),
        }
    }
}

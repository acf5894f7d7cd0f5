//! Tokio codec for remote shell sessions

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec};

use crate::error::ProtocolError;
use crate::frame::{SessionFrame, SessionRequest};
use crate::marker::StatusMarker;

/// Maximum length of a single output line (1 MiB)
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Codec for encoding session requests and decoding session frames
#[derive(Debug, Clone)]
pub struct SessionCodec {
    marker: StatusMarker,
    lines: LinesCodec,
    /// Status split off a line that also carried output
    pending: Option<SessionFrame>,
}

impl SessionCodec {
    /// Create a codec bound to a session marker
    pub fn new(marker: StatusMarker) -> Self {
        Self {
            marker,
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
            pending: None,
        }
    }

    /// The marker this codec recognises
    pub fn marker(&self) -> &StatusMarker {
        &self.marker
    }

    fn classify(&mut self, line: String) -> SessionFrame {
        match self.marker.split_status(&line) {
            Some(("", exit_code)) => SessionFrame::Status { exit_code },
            Some((output, exit_code)) => {
                self.pending = Some(SessionFrame::Status { exit_code });
                SessionFrame::Output(output.to_string())
            }
            None => SessionFrame::Output(line),
        }
    }
}

impl Decoder for SessionCodec {
    type Item = SessionFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        match self.lines.decode(src)? {
            Some(line) => Ok(Some(self.classify(line))),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        match self.lines.decode_eof(src)? {
            Some(line) => Ok(Some(self.classify(line))),
            None => Ok(None),
        }
    }
}

impl Encoder<SessionRequest> for SessionCodec {
    type Error = ProtocolError;

    fn encode(&mut self, request: SessionRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match request {
            SessionRequest::Command(command) => {
                let line = self.marker.wrap(&command);
                dst.reserve(line.len() + 1);
                dst.put_slice(line.as_bytes());
                dst.put_u8(b'\n');
            }
            SessionRequest::Release => dst.put_u8(b'\n'),
            SessionRequest::Exit => dst.put_slice(b"exit\n"),
        }
        Ok(())
    }
}

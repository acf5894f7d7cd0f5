//! Per-session status markers
//!
//! The marker is the only out-of-band signal on the channel, so it carries a
//! random nonce: command output that happens to print something marker-like
//! cannot be mistaken for a status frame.

/// Status marker appended after every command sent over a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMarker {
    tag: String,
}

impl StatusMarker {
    /// Create a marker with a fresh random nonce
    pub fn random() -> Self {
        Self::with_nonce(rand::random::<u64>())
    }

    /// Create a marker from a fixed nonce
    pub fn with_nonce(nonce: u64) -> Self {
        Self {
            tag: format!("__HS_RC_{:016x}__", nonce),
        }
    }

    /// The marker tag as it appears on the wire, without the status
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Shell suffix that reports the preceding command's exit status.
    ///
    /// Appended as `<command>; <suffix>`.
    pub fn suffix(&self) -> String {
        format!("__hs_rc=$?; echo {}:$__hs_rc", self.tag)
    }

    /// Render the full request line for a command (without trailing newline)
    pub fn wrap(&self, command: &str) -> String {
        format!("{}; {}", command, self.suffix())
    }

    /// Recover the original command from a wrapped request line.
    ///
    /// Returns `None` if the line was not produced by [`StatusMarker::wrap`]
    /// with this marker.
    #[cfg(test)]
    pub fn unwrap_request<'a>(&self, line: &'a str) -> Option<&'a str> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        line.strip_suffix(&self.suffix())
            .and_then(|rest| rest.strip_suffix("; "))
    }

    /// Render the status line a shell would print for `exit_code`
    pub fn status_line(&self, exit_code: i32) -> String {
        format!("{}:{}", self.tag, exit_code)
    }

    /// Split a received line into the output preceding the marker and the
    /// reported exit code.
    ///
    /// Output that did not end with a newline shares a line with the marker,
    /// so the marker may appear anywhere in the line.
    pub fn split_status<'a>(&self, line: &'a str) -> Option<(&'a str, i32)> {
        let idx = line.find(&self.tag)?;
        let rest = line[idx + self.tag.len()..].strip_prefix(':')?;
        let code = rest.trim().parse::<i32>().ok()?;
        Some((&line[..idx], code))
    }
}

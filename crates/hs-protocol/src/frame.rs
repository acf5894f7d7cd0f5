//! Request and response frames
//!
//! # Message Flow
//!
//! 1. Client sends `Command` (command text + status suffix)
//! 2. Shell prints zero or more `Output` lines
//! 3. Shell prints one `Status` frame with the exit code
//!
//! A `Command` sent without waiting (e.g. `exec <handoff>`) may never produce
//! its `Status` frame; the client simply stops reading.

/// A frame decoded from the remote shell's stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFrame {
    /// One line of command output (newline stripped)
    Output(String),
    /// Completion of the current command
    Status {
        /// Exit status reported by the shell
        exit_code: i32,
    },
}

impl SessionFrame {
    /// Whether this frame completes a command
    pub fn is_status(&self) -> bool {
        matches!(self, SessionFrame::Status { .. })
    }
}

/// A request written to the remote shell's stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    /// Run a command line and report its status
    Command(String),
    /// A bare newline, used to release a shell blocked in `read`
    Release,
    /// Ask the shell to exit
    Exit,
}

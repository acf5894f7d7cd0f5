//! Remote execution traits

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::SwapError;
use crate::types::Endpoint;

/// Options for a one-shot remote command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Give up after this long (the ssh process is killed)
    pub timeout: Option<Duration>,
    /// Wrap the command in `bash -lc` so profile PATH changes apply
    pub login_shell: bool,
}

impl RunOptions {
    /// Plain command, no timeout
    pub fn plain() -> Self {
        Self::default()
    }

    /// Command run through a login shell
    pub fn login() -> Self {
        Self {
            login_shell: true,
            ..Self::default()
        }
    }

    /// Set a timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Captured result of a one-shot remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stdout
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Handle on the process backing a [`RemoteChannel`]
#[async_trait]
pub trait ChannelProcess: Send {
    /// Whether the channel process is still running
    fn is_alive(&mut self) -> bool;

    /// Terminate the channel process. Never fails.
    async fn kill(&mut self);
}

/// A persistent bidirectional channel to a remote program
pub struct RemoteChannel {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    pub process: Box<dyn ChannelProcess>,
}

impl fmt::Debug for RemoteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteChannel").finish_non_exhaustive()
    }
}

/// Abstraction over the transport to the remote host
#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Run a single command and capture its output.
    ///
    /// A non-zero exit is reported in [`CommandOutput::exit_code`], not as an
    /// error; errors mean the transport itself failed.
    async fn run_once(
        &self,
        endpoint: &Endpoint,
        command: &str,
        options: RunOptions,
    ) -> Result<CommandOutput, SwapError>;

    /// Start `program` on the remote host with piped stdio
    async fn open_channel(
        &self,
        endpoint: &Endpoint,
        program: &str,
    ) -> Result<RemoteChannel, SwapError>;
}

//! Remote execution through the system `ssh` client
//!
//! Every call shares one multiplexed master connection
//! (`ControlMaster=auto`), so only the first command pays for the handshake.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

use hs_core::config::expand_home;
use hs_core::traits::{ChannelProcess, CommandOutput, RemoteChannel, RemoteExec, RunOptions};
use hs_core::{Endpoint, SwapError};

/// Reply expected from the reachability check
pub const PING_TOKEN: &str = "__PING__";

/// ssh control socket path, shared by all invocations
pub const CONTROL_PATH: &str = "~/.ssh/cm-%r@%h:%p";

/// Time allowed on top of the connect timeout for the reachability check
const CHECK_SLACK: Duration = Duration::from_secs(5);

/// Build the ssh arguments for `endpoint`, up to and including the
/// destination.
pub fn build_ssh_args(endpoint: &Endpoint) -> Vec<String> {
    let mut args = vec!["-p".to_string(), endpoint.port.to_string()];
    push_options(&mut args, endpoint);
    args.push(endpoint.destination());
    args
}

/// Build scp arguments copying local `source` into `target` on `endpoint`.
///
/// Same options as [`build_ssh_args`], so the copy rides the shared master
/// connection.
pub fn build_scp_args(endpoint: &Endpoint, source: &Path, target: &str) -> Vec<String> {
    let mut args = vec!["-P".to_string(), endpoint.port.to_string()];
    push_options(&mut args, endpoint);
    args.push(source.to_string_lossy().into_owned());
    args.push(format!("{}:{}", endpoint.destination(), target));
    args
}

fn push_options(args: &mut Vec<String>, endpoint: &Endpoint) {
    if let Some(identity) = &endpoint.identity_file {
        args.push("-i".to_string());
        args.push(expand_home(identity).to_string_lossy().into_owned());
    }

    let options = [
        "BatchMode=yes".to_string(),
        format!("ConnectTimeout={}", endpoint.connect_timeout.as_secs()),
        format!(
            "StrictHostKeyChecking={}",
            endpoint.strict_host_key_checking.as_str()
        ),
        format!("ServerAliveInterval={}", endpoint.server_alive_interval.as_secs()),
        format!("ServerAliveCountMax={}", endpoint.server_alive_count_max),
        "IdentitiesOnly=yes".to_string(),
        "ControlMaster=auto".to_string(),
        format!("ControlPath={}", CONTROL_PATH),
        "ControlPersist=60s".to_string(),
    ];
    for opt in options.into_iter().chain(endpoint.extra_options.iter().cloned()) {
        args.push("-o".to_string());
        args.push(opt);
    }
}

/// [`RemoteExec`] backed by the `ssh` binary
#[derive(Debug, Clone)]
pub struct SshTransport {
    program: String,
}

impl SshTransport {
    /// Use `ssh` from `PATH`
    pub fn new() -> Self {
        Self {
            program: "ssh".to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, endpoint: &Endpoint, remote: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(build_ssh_args(endpoint)).arg(remote);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> SwapError {
        SwapError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExec for SshTransport {
    async fn run_once(
        &self,
        endpoint: &Endpoint,
        command: &str,
        options: RunOptions,
    ) -> Result<CommandOutput, SwapError> {
        let remote = if options.login_shell {
            format!("bash -lc {}", shell_words::quote(command))
        } else {
            command.to_string()
        };
        tracing::debug!("ssh {} :: {}", endpoint, remote);

        let mut cmd = self.command(endpoint, &remote);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        let child = cmd.output();

        let output = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, child).await.map_err(|_| {
                SwapError::Connection {
                    host: endpoint.host.clone(),
                    detail: format!("command timed out after {:?}", limit),
                }
            })?,
            None => child.await,
        }
        .map_err(|e| self.spawn_error(e))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn open_channel(
        &self,
        endpoint: &Endpoint,
        program: &str,
    ) -> Result<RemoteChannel, SwapError> {
        tracing::debug!("ssh channel {} :: {}", endpoint, program);

        // Not killed on drop: a released armed channel must outlive us.
        let mut child = self
            .command(endpoint, program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let broken = || std::io::Error::new(std::io::ErrorKind::BrokenPipe, "ssh stdio not piped");
        let stdin = child.stdin.take().ok_or_else(|| self.spawn_error(broken()))?;
        let stdout = child.stdout.take().ok_or_else(|| self.spawn_error(broken()))?;
        let stderr = child.stderr.take().ok_or_else(|| self.spawn_error(broken()))?;

        Ok(RemoteChannel {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            process: Box::new(SshProcess { child }),
        })
    }
}

/// The local `ssh` process behind a channel
struct SshProcess {
    child: Child,
}

#[async_trait]
impl ChannelProcess for SshProcess {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("ssh channel kill failed: {}", e);
        }
    }
}

/// Ping the endpoint with `echo __PING__`.
///
/// Fails with [`SwapError::Connection`] carrying ssh's stderr.
pub async fn check_connection(exec: &dyn RemoteExec, endpoint: &Endpoint) -> Result<(), SwapError> {
    let options = RunOptions::plain().with_timeout(endpoint.connect_timeout + CHECK_SLACK);
    let output = exec
        .run_once(endpoint, &format!("echo {}", PING_TOKEN), options)
        .await?;

    if output.success() && output.stdout.contains(PING_TOKEN) {
        Ok(())
    } else {
        let detail = match output.stderr.trim() {
            "" => format!("exit status {}", output.exit_code),
            err => err.to_string(),
        };
        Err(SwapError::Connection {
            host: endpoint.host.clone(),
            detail,
        })
    }
}

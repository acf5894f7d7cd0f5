//! Local processes: fire-and-forget spawns with bounded waits, and short
//! captured commands

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use hs_core::traits::{CommandOutput, LocalChild, LocalExec, LocalSpawner};
use hs_core::SwapError;

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process exited; `None` when killed by a signal
    Exited(Option<i32>),
    /// Still running when the bound expired. The process is left alone.
    StillRunning,
}

/// A spawned local process that is waited on but never required to finish
pub struct SupervisedChild {
    program: String,
    child: Box<dyn LocalChild>,
}

impl SupervisedChild {
    /// Spawn `argv` through `spawner`
    pub fn spawn(spawner: &dyn LocalSpawner, argv: &[String]) -> Result<Self, SwapError> {
        let child = spawner.spawn(argv)?;
        let program = argv.first().cloned().unwrap_or_default();
        tracing::debug!("spawned {} (pid {:?})", program, child.id());
        Ok(Self { program, child })
    }

    /// OS process id
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait up to `limit` for the process to exit
    pub async fn wait_bounded(&mut self, limit: Duration) -> WaitOutcome {
        match tokio::time::timeout(limit, self.child.wait()).await {
            Ok(Ok(code)) => {
                tracing::debug!("{} exited with {:?}", self.program, code);
                WaitOutcome::Exited(code)
            }
            Ok(Err(e)) => {
                tracing::warn!("waiting on {} failed: {}", self.program, e);
                WaitOutcome::StillRunning
            }
            Err(_) => {
                tracing::warn!("{} still running after {:?}", self.program, limit);
                WaitOutcome::StillRunning
            }
        }
    }

    /// Kill the process
    pub async fn kill(&mut self) {
        self.child.kill().await;
    }
}

/// Spawns real processes with tokio. Output goes to `/dev/null` and the
/// process survives the handle being dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl LocalSpawner for TokioSpawner {
    fn spawn(&self, argv: &[String]) -> Result<Box<dyn LocalChild>, SwapError> {
        let (program, args) = split_argv(argv)?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| SwapError::Spawn {
                program: program.clone(),
                source,
            })?;
        Ok(Box::new(TokioChild(child)))
    }
}

fn split_argv(argv: &[String]) -> Result<(&String, &[String]), SwapError> {
    argv.split_first().ok_or_else(|| SwapError::Spawn {
        program: String::new(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
    })
}

#[async_trait]
impl LocalExec for TokioSpawner {
    async fn output(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput, SwapError> {
        let (program, args) = split_argv(argv)?;
        tracing::debug!("local: {}", shell_words::join(argv));

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| SwapError::Timeout {
                program: program.clone(),
                after: timeout,
            })?
            .map_err(|source| SwapError::Spawn {
                program: program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn scan_line(
        &self,
        argv: &[String],
        prefix: &str,
        timeout: Duration,
    ) -> Result<Option<String>, SwapError> {
        let (program, args) = split_argv(argv)?;
        tracing::debug!("local scan for {:?}: {}", prefix, shell_words::join(argv));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SwapError::Spawn {
                program: program.clone(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| SwapError::Spawn {
            program: program.clone(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "stdout not piped"),
        })?;

        let mut lines = BufReader::new(stdout).lines();
        let scan = async {
            while let Some(line) = lines.next_line().await? {
                if let Some(rest) = line.trim().strip_prefix(prefix) {
                    return Ok(Some(rest.trim().to_string()));
                }
            }
            Ok::<_, io::Error>(None)
        };
        let found = match tokio::time::timeout(timeout, scan).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!("{} printed no {:?} within {:?}", program, prefix, timeout);
                None
            }
        };

        if let Err(e) = child.kill().await {
            tracing::debug!("kill failed: {}", e);
        }
        Ok(found)
    }
}

struct TokioChild(Child);

#[async_trait]
impl LocalChild for TokioChild {
    fn id(&self) -> Option<u32> {
        self.0.id()
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.0.wait().await?.code())
    }

    async fn kill(&mut self) {
        if let Err(e) = self.0.kill().await {
            tracing::debug!("kill failed: {}", e);
        }
    }
}

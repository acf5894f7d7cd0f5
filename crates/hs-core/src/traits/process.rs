//! Process table and local process traits

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::remote::CommandOutput;
use crate::error::SwapError;

/// A point-in-time view of one process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Short command name (`comm`)
    pub name: String,
    /// Executable path, if readable
    pub exe: Option<PathBuf>,
    /// Full argument vector including argv[0]
    pub args: Vec<String>,
    /// Targets of open file descriptors. Empty unless requested.
    pub open_files: Vec<PathBuf>,
    /// Working directory, if readable
    pub cwd: Option<PathBuf>,
}

impl ProcessInfo {
    /// File name of the executable
    pub fn exe_basename(&self) -> Option<&str> {
        self.exe
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
    }

    /// Arguments joined by single spaces, as `/proc/<pid>/cmdline` reads
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }

    /// Whether the process references `needle` through its working
    /// directory, an open file or its arguments (substring match).
    pub fn references_path(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        let contains = |p: &Path| p.to_string_lossy().contains(needle);
        if self.cwd.as_deref().is_some_and(contains) {
            return true;
        }
        if self.open_files.iter().any(|p| contains(p)) {
            return true;
        }
        self.command_line().contains(needle)
    }
}

/// Source of process table snapshots
#[async_trait]
pub trait ProcessSnapshotProvider: Send + Sync {
    /// List all processes. `include_open_files` fills
    /// [`ProcessInfo::open_files`], which is costly.
    async fn snapshot(&self, include_open_files: bool) -> Result<Vec<ProcessInfo>, SwapError>;
}

/// A locally spawned child process
#[async_trait]
pub trait LocalChild: Send {
    /// OS process id, if still known
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit. `Ok(None)` when killed by a signal.
    async fn wait(&mut self) -> io::Result<Option<i32>>;

    /// Kill the process. Never fails.
    async fn kill(&mut self);
}

/// Spawns detached local processes from an argument vector
pub trait LocalSpawner: Send + Sync {
    /// Start `argv[0]` with `argv[1..]`; output is discarded
    fn spawn(&self, argv: &[String]) -> Result<Box<dyn LocalChild>, SwapError>;
}

/// Runs short-lived local commands and captures what they print
#[async_trait]
pub trait LocalExec: Send + Sync {
    /// Run `argv` to completion. Killed and reported as
    /// [`SwapError::Timeout`] after `timeout`.
    async fn output(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput, SwapError>;

    /// Read stdout of `argv` until a line starts with `prefix`, then kill the
    /// process. Returns the rest of that line, trimmed, or `None` when the
    /// process ends or `timeout` passes first.
    async fn scan_line(
        &self,
        argv: &[String],
        prefix: &str,
        timeout: Duration,
    ) -> Result<Option<String>, SwapError>;
}

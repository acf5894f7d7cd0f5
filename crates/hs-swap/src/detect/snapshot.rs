//! Process table snapshots, local and remote

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use hs_core::traits::{ProcessInfo, ProcessSnapshotProvider, RemoteExec, RunOptions};
use hs_core::{Endpoint, SwapError};

/// Local process table via `sysinfo`, plus `/proc/<pid>/fd` on Linux
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoSnapshot;

impl SysinfoSnapshot {
    pub fn new() -> Self {
        Self
    }

    fn collect(include_open_files: bool) -> Vec<ProcessInfo> {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new()
                .with_cmd(UpdateKind::Always)
                .with_exe(UpdateKind::Always)
                .with_cwd(UpdateKind::Always),
        );

        system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                ProcessInfo {
                    pid,
                    name: process.name().to_string_lossy().into_owned(),
                    exe: process.exe().map(PathBuf::from),
                    args: process
                        .cmd()
                        .iter()
                        .map(|a| a.to_string_lossy().into_owned())
                        .collect(),
                    open_files: if include_open_files {
                        open_files(pid)
                    } else {
                        Vec::new()
                    },
                    cwd: process.cwd().map(PathBuf::from),
                }
            })
            .collect()
    }
}

#[cfg(target_os = "linux")]
fn open_files(pid: u32) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(format!("/proc/{}/fd", pid)) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn open_files(_pid: u32) -> Vec<PathBuf> {
    Vec::new()
}

#[async_trait]
impl ProcessSnapshotProvider for SysinfoSnapshot {
    async fn snapshot(&self, include_open_files: bool) -> Result<Vec<ProcessInfo>, SwapError> {
        let processes = tokio::task::spawn_blocking(move || Self::collect(include_open_files))
            .await
            .map_err(|e| SwapError::Io(std::io::Error::other(e)))?;
        Ok(processes)
    }
}

/// Shell script dumping one tagged record per line for every process.
///
/// Tags: `P` pid (starts a record), `N` comm, `E` exe, `A` args separated by
/// `\x1f`, `C` cwd, `F` one open file target.
fn dump_script(include_open_files: bool) -> String {
    let fds = if include_open_files {
        r#" for f in "$d"/fd/*; do t=$(readlink "$f" 2>/dev/null) && printf 'F\t%s\n' "$t"; done;"#
    } else {
        ""
    };
    format!(
        concat!(
            "for d in /proc/[0-9]*; do ",
            "[ -r \"$d/cmdline\" ] || continue; ",
            "printf 'P\\t%s\\n' \"${{d#/proc/}}\"; ",
            "printf 'N\\t%s\\n' \"$(cat \"$d/comm\" 2>/dev/null)\"; ",
            "printf 'E\\t%s\\n' \"$(readlink \"$d/exe\" 2>/dev/null)\"; ",
            "printf 'A\\t%s\\n' \"$(tr '\\000' '\\037' < \"$d/cmdline\" 2>/dev/null)\"; ",
            "printf 'C\\t%s\\n' \"$(readlink \"$d/cwd\" 2>/dev/null)\";",
            "{}",
            " done"
        ),
        fds
    )
}

/// Parse the output of [`dump_script`]
pub fn parse_dump(output: &str) -> Vec<ProcessInfo> {
    let mut processes = Vec::new();
    let mut current: Option<ProcessInfo> = None;

    for line in output.lines() {
        let Some((tag, value)) = line.split_once('\t') else {
            continue;
        };
        if tag == "P" {
            processes.extend(current.take());
            current = value.trim().parse().ok().map(|pid| ProcessInfo {
                pid,
                ..Default::default()
            });
            continue;
        }
        let Some(process) = current.as_mut() else {
            continue;
        };
        let path = || (!value.is_empty()).then(|| PathBuf::from(value));
        match tag {
            "N" => process.name = value.to_string(),
            "E" => process.exe = path(),
            "A" => {
                process.args = value
                    .split('\u{1f}')
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "C" => process.cwd = path(),
            "F" => process.open_files.extend(path()),
            _ => {}
        }
    }
    processes.extend(current);
    processes
}

/// Remote process table, read over one ssh round trip
#[derive(Clone)]
pub struct RemoteProcSnapshot {
    exec: Arc<dyn RemoteExec>,
    endpoint: Endpoint,
}

impl RemoteProcSnapshot {
    pub fn new(exec: Arc<dyn RemoteExec>, endpoint: Endpoint) -> Self {
        Self { exec, endpoint }
    }
}

#[async_trait]
impl ProcessSnapshotProvider for RemoteProcSnapshot {
    async fn snapshot(&self, include_open_files: bool) -> Result<Vec<ProcessInfo>, SwapError> {
        let output = self
            .exec
            .run_once(&self.endpoint, &dump_script(include_open_files), RunOptions::login())
            .await?;
        if !output.success() {
            return Err(SwapError::RemoteCommand {
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(parse_dump(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dump() {
        let dump = "P\t1\nN\tsystemd\nE\t/usr/lib/systemd/systemd\nA\t/sbin/init\x1fsplash\nC\t/\n\
                    P\t812\nN\tagave-validator\nE\t\nA\tagave-validator\x1f--ledger\x1f/mnt/l\x1f\n\
                    C\t/home/sol\nF\t/mnt/l/rocksdb/LOCK\nF\tsocket:[1234]\n";
        let procs = parse_dump(dump);
        assert_eq!(procs.len(), 2);

        assert_eq!(procs[0].pid, 1);
        assert_eq!(procs[0].args, vec!["/sbin/init", "splash"]);
        assert_eq!(procs[0].exe_basename(), Some("systemd"));

        let agave = &procs[1];
        assert_eq!(agave.name, "agave-validator");
        assert_eq!(agave.exe, None);
        assert_eq!(agave.args, vec!["agave-validator", "--ledger", "/mnt/l"]);
        assert_eq!(agave.open_files.len(), 2);
        assert!(agave.references_path("/mnt/l"));
    }

    #[test]
    fn test_parse_dump_skips_orphan_lines() {
        let procs = parse_dump("N\tlost\nP\tnot-a-pid\nN\tstill-lost\n");
        assert!(procs.is_empty());
    }

    #[test]
    fn test_dump_script_fd_section() {
        assert!(dump_script(true).contains("/fd/*"));
        assert!(!dump_script(false).contains("/fd/*"));
    }

    #[tokio::test]
    async fn test_local_snapshot_sees_self() {
        let me = std::process::id();
        let procs = SysinfoSnapshot::new().snapshot(false).await.unwrap();
        assert!(procs.iter().any(|p| p.pid == me));
    }
}

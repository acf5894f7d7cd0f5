//! In-memory doubles for the remote host, local processes and the operator

use async_trait::async_trait;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};

use hs_core::traits::{
    ChannelProcess, CommandOutput, Confirmation, LocalChild, LocalExec, LocalSpawner, OperatorSink,
    PlanEntry, ProcessInfo, ProcessSnapshotProvider, RemoteChannel, RemoteExec, RunOptions,
};
use hs_core::{Endpoint, SwapError};

use crate::paths::RAW_PATH_VAR;
use crate::session::SESSION_PROGRAM;

/// Home directory of the fake remote user
pub const FAKE_HOME: &str = "/home/sol";

/// Observable side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    RunOnce(String),
    SessionOpened,
    SessionCommand(String),
    ArmedOpened(String),
    Release,
    StdinClosed,
    Spawn(Vec<String>),
    LocalWait,
    Killed(&'static str),
}

/// Ordered, shared record of side effects
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

type Handler = dyn Fn(&str) -> CommandOutput + Send + Sync;

/// Scriptable remote host
pub struct FakeRemote {
    pub events: EventLog,
    run_once: Arc<Handler>,
    shell: Arc<Handler>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            events: EventLog::default(),
            run_once: Arc::new(default_run_once),
            shell: Arc::new(default_shell),
        }
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn with_run_once(mut self, f: impl Fn(&str) -> CommandOutput + Send + Sync + 'static) -> Self {
        self.run_once = Arc::new(f);
        self
    }

    pub fn with_shell(mut self, f: impl Fn(&str) -> CommandOutput + Send + Sync + 'static) -> Self {
        self.shell = Arc::new(f);
        self
    }

    pub fn run_once_calls(&self) -> Vec<String> {
        self.events
            .snapshot()
            .into_iter()
            .filter_map(|e| match e {
                Event::RunOnce(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RemoteExec for FakeRemote {
    async fn run_once(
        &self,
        _endpoint: &Endpoint,
        command: &str,
        _options: RunOptions,
    ) -> Result<CommandOutput, SwapError> {
        self.events.push(Event::RunOnce(command.to_string()));
        Ok((self.run_once)(command))
    }

    async fn open_channel(
        &self,
        _endpoint: &Endpoint,
        program: &str,
    ) -> Result<RemoteChannel, SwapError> {
        let (client_in, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, client_out) = tokio::io::duplex(64 * 1024);
        let (server_err, client_err) = tokio::io::duplex(64 * 1024);
        let alive = Arc::new(AtomicBool::new(true));

        if program == SESSION_PROGRAM {
            self.events.push(Event::SessionOpened);
            tokio::spawn(serve_shell(
                server_in,
                server_out,
                server_err,
                Arc::clone(&self.shell),
                self.events.clone(),
                Arc::clone(&alive),
            ));
            Ok(RemoteChannel {
                stdin: Box::new(client_in),
                stdout: Box::new(client_out),
                stderr: Box::new(client_err),
                process: Box::new(FakeProcess {
                    alive,
                    events: self.events.clone(),
                    label: "session",
                }),
            })
        } else {
            self.events.push(Event::ArmedOpened(program.to_string()));
            tokio::spawn(serve_armed(server_in, server_out, server_err));
            Ok(RemoteChannel {
                stdin: Box::new(RecordingWriter {
                    inner: client_in,
                    events: self.events.clone(),
                }),
                stdout: Box::new(client_out),
                stderr: Box::new(client_err),
                process: Box::new(FakeProcess {
                    alive,
                    events: self.events.clone(),
                    label: "armed",
                }),
            })
        }
    }
}

fn default_run_once(command: &str) -> CommandOutput {
    let stdout = if let Some(raw) = resolve_request(command) {
        format!("{}\n", fake_resolve(&raw))
    } else if command.contains("TOWER_LEFT") {
        "TOWER_LEFT:0\n".to_string()
    } else if let Some(rest) = command.strip_prefix("echo ") {
        format!("{}\n", rest)
    } else {
        String::new()
    };
    CommandOutput {
        stdout,
        ..Default::default()
    }
}

fn default_shell(command: &str) -> CommandOutput {
    let stdout = if command.contains("TOWER_LEFT") {
        "TOWER_LEFT:0\n".to_string()
    } else {
        String::new()
    };
    CommandOutput {
        stdout,
        ..Default::default()
    }
}

/// Raw path carried by a path-expansion command
pub fn resolve_request(command: &str) -> Option<String> {
    let rest = command.strip_prefix(&format!("{}=", RAW_PATH_VAR))?;
    let (quoted, _) = rest.split_once(" python3 -c ")?;
    shell_words::split(quoted).ok()?.into_iter().next()
}

/// What the fake host resolves `raw` to
pub fn fake_resolve(raw: &str) -> String {
    let expanded = raw.replace("$HOME", FAKE_HOME);
    match expanded.strip_prefix('~') {
        Some(rest) => format!("{}{}", FAKE_HOME, rest),
        None => expanded,
    }
}

fn split_request(line: &str) -> Option<(&str, &str)> {
    let (command, rest) = line.rsplit_once("; __hs_rc=$?; echo ")?;
    let tag = rest.strip_suffix(":$__hs_rc")?;
    Some((command, tag))
}

async fn serve_shell(
    input: DuplexStream,
    mut out: DuplexStream,
    mut err: DuplexStream,
    shell: Arc<Handler>,
    events: EventLog,
    alive: Arc<AtomicBool>,
) {
    let mut lines = BufReader::new(input).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line == "exit" {
            break;
        }
        let Some((command, tag)) = split_request(&line) else {
            continue;
        };
        events.push(Event::SessionCommand(command.to_string()));
        if command.starts_with("exec ") {
            break;
        }
        let reply = shell(command);
        let _ = err.write_all(reply.stderr.as_bytes()).await;
        let status = format!("{}{}:{}\n", reply.stdout, tag, reply.exit_code);
        let _ = out.write_all(status.as_bytes()).await;
    }
    alive.store(false, Ordering::SeqCst);
}

async fn serve_armed(mut input: DuplexStream, _out: DuplexStream, _err: DuplexStream) {
    let mut buf = Vec::new();
    let _ = input.read_to_end(&mut buf).await;
}

struct FakeProcess {
    alive: Arc<AtomicBool>,
    events: EventLog,
    label: &'static str,
}

#[async_trait]
impl ChannelProcess for FakeProcess {
    fn is_alive(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn kill(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.events.push(Event::Killed(self.label));
    }
}

/// Records the release newline and stdin shutdown at the moment they are
/// written
struct RecordingWriter {
    inner: DuplexStream,
    events: EventLog,
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            if buf[..*n].contains(&b'\n') {
                self.events.push(Event::Release);
            }
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let poll = Pin::new(&mut self.inner).poll_shutdown(cx);
        if poll.is_ready() {
            self.events.push(Event::StdinClosed);
        }
        poll
    }
}

/// Write an executable `/bin/sh` script standing in for a system binary
pub fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(format!("#!/bin/sh\n{}\n", body).as_bytes()).unwrap();
    file.sync_all().unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

/// Local spawner whose children take `latency` to exit
pub struct FakeSpawner {
    pub events: EventLog,
    latency: Duration,
    fail: bool,
}

impl FakeSpawner {
    pub fn new(events: EventLog, latency: Duration) -> Self {
        Self {
            events,
            latency,
            fail: false,
        }
    }

    pub fn failing(events: EventLog) -> Self {
        Self {
            events,
            latency: Duration::ZERO,
            fail: true,
        }
    }
}

impl LocalSpawner for FakeSpawner {
    fn spawn(&self, argv: &[String]) -> Result<Box<dyn LocalChild>, SwapError> {
        if self.fail {
            return Err(SwapError::Spawn {
                program: argv.first().cloned().unwrap_or_default(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            });
        }
        self.events.push(Event::Spawn(argv.to_vec()));
        Ok(Box::new(FakeChild {
            events: self.events.clone(),
            latency: self.latency,
        }))
    }
}

struct FakeChild {
    events: EventLog,
    latency: Duration,
}

#[async_trait]
impl LocalChild for FakeChild {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        self.events.push(Event::LocalWait);
        tokio::time::sleep(self.latency).await;
        Ok(Some(0))
    }

    async fn kill(&mut self) {
        self.events.push(Event::Killed("local"));
    }
}

type LocalHandler = dyn Fn(&[String]) -> Result<CommandOutput, SwapError> + Send + Sync;

/// Scriptable local commands; every argv is recorded
pub struct FakeLocal {
    handler: Box<LocalHandler>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeLocal {
    pub fn new(
        handler: impl Fn(&[String]) -> Result<CommandOutput, SwapError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn run(&self, argv: &[String]) -> Result<CommandOutput, SwapError> {
        self.calls.lock().unwrap().push(argv.to_vec());
        (self.handler)(argv)
    }
}

#[async_trait]
impl LocalExec for FakeLocal {
    async fn output(&self, argv: &[String], _timeout: Duration) -> Result<CommandOutput, SwapError> {
        self.run(argv)
    }

    async fn scan_line(
        &self,
        argv: &[String],
        prefix: &str,
        _timeout: Duration,
    ) -> Result<Option<String>, SwapError> {
        let out = self.run(argv)?;
        Ok(out
            .stdout
            .lines()
            .find_map(|l| l.trim().strip_prefix(prefix))
            .map(|rest| rest.trim().to_string()))
    }
}

/// Operator that answers with a fixed confirmation and keeps what it was
/// shown
pub struct RecordingSink {
    answer: Confirmation,
    pub plans: Mutex<Vec<Vec<PlanEntry>>>,
    pub lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new(answer: Confirmation) -> Self {
        Self {
            answer,
            plans: Mutex::new(Vec::new()),
            lines: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl OperatorSink for RecordingSink {
    fn plan(&self, entries: &[PlanEntry]) {
        self.plans.lock().unwrap().push(entries.to_vec());
    }

    fn verbose(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    async fn confirm(&self) -> Confirmation {
        self.answer
    }
}

/// Fixed process table
pub struct FakeSnapshot(pub Vec<ProcessInfo>);

#[async_trait]
impl ProcessSnapshotProvider for FakeSnapshot {
    async fn snapshot(&self, include_open_files: bool) -> Result<Vec<ProcessInfo>, SwapError> {
        let mut processes = self.0.clone();
        if !include_open_files {
            for p in &mut processes {
                p.open_files.clear();
            }
        }
        Ok(processes)
    }
}

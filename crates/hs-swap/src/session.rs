//! Persistent remote shell sessions
//!
//! A [`RemoteSession`] keeps one `bash -s -l` running on the remote host and
//! feeds it command lines. Each line carries a status suffix, so the reader
//! knows exactly where one command's output ends and what it exited with.
//!
//! An [`ArmedChannel`] is a second, one-shot channel that blocks in `read`
//! until released by a single newline, then `exec`s its command.

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use hs_core::traits::{ChannelProcess, RemoteChannel, RemoteExec};
use hs_core::{Endpoint, SwapError};
use hs_protocol::{ProtocolError, SessionCodec, SessionFrame, SessionRequest, StatusMarker};

/// Program started for a session
pub const SESSION_PROGRAM: &str = "/bin/bash -s -l";

/// Time given to the stderr drain to catch up once a status arrives
const STDERR_SETTLE: Duration = Duration::from_millis(20);

/// How long `close` waits for the shell to exit before killing it
const CLOSE_GRACE: Duration = Duration::from_millis(200);
const CLOSE_POLL: Duration = Duration::from_millis(10);

type Reader = FramedRead<Box<dyn AsyncRead + Send + Unpin>, SessionCodec>;
type Writer = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, SessionCodec>;

/// A long-lived remote shell with ordered, status-checked execution
pub struct RemoteSession {
    reader: Reader,
    writer: Writer,
    stderr: Arc<Mutex<String>>,
    stderr_task: JoinHandle<()>,
    process: Box<dyn ChannelProcess>,
    /// Status frames still owed by commands sent without waiting
    unread: usize,
    poisoned: bool,
    closed: bool,
}

impl RemoteSession {
    /// Start a session on `endpoint`
    pub async fn open(exec: &dyn RemoteExec, endpoint: &Endpoint) -> Result<Self, SwapError> {
        let channel = exec.open_channel(endpoint, SESSION_PROGRAM).await?;
        tracing::debug!("session opened on {}", endpoint);
        Ok(Self::from_channel(channel, StatusMarker::random()))
    }

    /// Wrap an already open channel
    pub fn from_channel(channel: RemoteChannel, marker: StatusMarker) -> Self {
        let RemoteChannel {
            stdin,
            stdout,
            stderr,
            process,
        } = channel;

        let buffer = Arc::new(Mutex::new(String::new()));
        let stderr_task = tokio::spawn(drain_into(stderr, Arc::clone(&buffer)));

        Self {
            reader: FramedRead::new(stdout, SessionCodec::new(marker.clone())),
            writer: FramedWrite::new(stdin, SessionCodec::new(marker)),
            stderr: buffer,
            stderr_task,
            process,
            unread: 0,
            poisoned: false,
            closed: false,
        }
    }

    /// Whether a failed command has made the session unusable
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Run one command line.
    ///
    /// With `wait`, blocks until its status frame and returns
    /// `(stdout, stderr)`; a non-zero status fails with
    /// [`SwapError::RemoteCommand`] and poisons the session. Without `wait`,
    /// returns as soon as the line is written.
    pub async fn run(&mut self, line: &str, wait: bool) -> Result<(String, String), SwapError> {
        if self.poisoned {
            return Err(SwapError::SessionPoisoned);
        }
        if self.closed {
            return Err(SwapError::ChannelClosed {
                stdout: String::new(),
            });
        }

        tracing::debug!("session <- {}", line);
        if let Err(e) = self.writer.send(SessionRequest::Command(line.to_string())).await {
            self.poisoned = true;
            return Err(match e {
                ProtocolError::Io(io) if io.kind() == std::io::ErrorKind::BrokenPipe => {
                    SwapError::ChannelClosed {
                        stdout: String::new(),
                    }
                }
                other => other.into(),
            });
        }

        if !wait {
            self.unread += 1;
            return Ok((String::new(), String::new()));
        }

        let mut stdout = String::new();
        loop {
            let frame = match self.reader.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.poisoned = true;
                    return Err(e.into());
                }
                None => {
                    self.poisoned = true;
                    return Err(SwapError::ChannelClosed { stdout });
                }
            };

            match frame {
                SessionFrame::Output(_) if self.unread > 0 => {}
                SessionFrame::Status { .. } if self.unread > 0 => self.unread -= 1,
                SessionFrame::Output(text) => {
                    stdout.push_str(&text);
                    stdout.push('\n');
                }
                SessionFrame::Status { exit_code: 0 } => {
                    let stderr = self.settle_stderr().await;
                    return Ok((stdout, stderr));
                }
                SessionFrame::Status { exit_code } => {
                    self.poisoned = true;
                    let stderr = self.settle_stderr().await;
                    return Err(SwapError::RemoteCommand {
                        exit_code,
                        stdout,
                        stderr,
                    });
                }
            }
        }
    }

    /// stderr travels on its own pipe and may trail the status frame
    async fn settle_stderr(&self) -> String {
        tokio::time::sleep(STDERR_SETTLE).await;
        std::mem::take(&mut *self.stderr.lock().await)
    }

    /// Ask the shell to exit, then kill it if it lingers.
    ///
    /// Idempotent; never fails.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if self.process.is_alive() {
            if let Err(e) = self.writer.send(SessionRequest::Exit).await {
                tracing::debug!("session exit not delivered: {}", e);
            }
            let mut waited = Duration::ZERO;
            while self.process.is_alive() && waited < CLOSE_GRACE {
                tokio::time::sleep(CLOSE_POLL).await;
                waited += CLOSE_POLL;
            }
        }
        if self.process.is_alive() {
            tracing::debug!("session still alive after exit, killing");
            self.process.kill().await;
        }
        self.stderr_task.abort();
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        self.stderr_task.abort();
    }
}

async fn drain_into(mut stream: Box<dyn AsyncRead + Send + Unpin>, buffer: Arc<Mutex<String>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer
                .lock()
                .await
                .push_str(&String::from_utf8_lossy(&chunk[..n])),
        }
    }
}

async fn discard(mut stream: Box<dyn AsyncRead + Send + Unpin>, label: &'static str) {
    let mut sink = tokio::io::sink();
    if let Err(e) = tokio::io::copy(&mut stream, &mut sink).await {
        tracing::debug!("armed channel {} drain ended: {}", label, e);
    }
}

/// A pre-opened remote channel waiting for a newline before running its
/// command
pub struct ArmedChannel {
    stdin: Option<Writer>,
    process: Box<dyn ChannelProcess>,
    released: bool,
}

impl ArmedChannel {
    /// Remote program for an armed `command`.
    ///
    /// `&&` keeps the command from running if stdin closes without a
    /// newline.
    pub fn program(command: &str) -> String {
        format!("read -r _ && exec {}", command)
    }

    /// Open the channel. The remote side blocks until [`ArmedChannel::release`].
    pub async fn open(
        exec: &dyn RemoteExec,
        endpoint: &Endpoint,
        command: &str,
    ) -> Result<Self, SwapError> {
        let channel = exec.open_channel(endpoint, &Self::program(command)).await?;
        tracing::debug!("armed channel opened on {}", endpoint);

        tokio::spawn(discard(channel.stdout, "stdout"));
        tokio::spawn(discard(channel.stderr, "stderr"));

        Ok(Self {
            stdin: Some(FramedWrite::new(
                channel.stdin,
                SessionCodec::new(StatusMarker::random()),
            )),
            process: channel.process,
            released: false,
        })
    }

    /// Whether the release newline has been written
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Write the release newline. A channel that already died is logged and
    /// left alone.
    pub async fn release(&mut self) {
        if !self.process.is_alive() {
            tracing::warn!("armed channel exited before release");
            return;
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return;
        };
        match stdin.send(SessionRequest::Release).await {
            Ok(()) => self.released = true,
            Err(e) => tracing::warn!("armed channel release failed: {}", e),
        }
    }

    /// Tear down: close stdin after a release so the remote command can
    /// finish, kill the channel otherwise.
    pub async fn finish(mut self) {
        if self.released {
            if let Some(stdin) = self.stdin.take() {
                let mut inner = stdin.into_inner();
                if let Err(e) = inner.shutdown().await {
                    tracing::debug!("armed channel stdin close failed: {}", e);
                }
            }
        } else if self.process.is_alive() {
            tracing::debug!("armed channel never released, killing");
            self.process.kill().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, FakeRemote};
    use hs_core::traits::CommandOutput;

    fn endpoint() -> Endpoint {
        Endpoint::new("backup", "sol")
    }

    fn echo_shell(cmd: &str) -> CommandOutput {
        match cmd {
            "false" => CommandOutput {
                stderr: "it broke\n".into(),
                exit_code: 1,
                ..Default::default()
            },
            other => CommandOutput {
                stdout: format!("ran {}\n", other),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_outputs_follow_submission_order() {
        let remote = FakeRemote::new().with_shell(echo_shell);
        let mut session = RemoteSession::open(&remote, &endpoint()).await.unwrap();

        for i in 0..5 {
            let (out, _) = session.run(&format!("step{}", i), true).await.unwrap();
            assert_eq!(out, format!("ran step{}\n", i));
        }
        session.close().await;
    }

    #[tokio::test]
    async fn test_failure_poisons_session() {
        let remote = FakeRemote::new().with_shell(echo_shell);
        let mut session = RemoteSession::open(&remote, &endpoint()).await.unwrap();

        session.run("first", true).await.unwrap();
        let err = session.run("false", true).await.unwrap_err();
        match err {
            SwapError::RemoteCommand {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "it broke\n");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(session.is_poisoned());
        assert!(matches!(
            session.run("after", true).await,
            Err(SwapError::SessionPoisoned)
        ));
        session.close().await;

        let ran: Vec<_> = remote
            .events
            .snapshot()
            .into_iter()
            .filter_map(|e| match e {
                Event::SessionCommand(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(ran, vec!["first", "false"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stderr_stays_with_its_command() {
        let remote = FakeRemote::new().with_shell(|cmd| match cmd {
            "warn" => CommandOutput {
                stderr: "warning: slow disk\n".into(),
                ..Default::default()
            },
            _ => CommandOutput::default(),
        });
        let mut session = RemoteSession::open(&remote, &endpoint()).await.unwrap();

        let (_, stderr) = session.run("warn", true).await.unwrap();
        assert_eq!(stderr, "warning: slow disk\n");
        let (_, stderr) = session.run("quiet", true).await.unwrap();
        assert_eq!(stderr, "");
        session.close().await;
    }

    #[tokio::test]
    async fn test_channel_closing_before_status() {
        let remote = FakeRemote::new();
        let mut session = RemoteSession::open(&remote, &endpoint()).await.unwrap();

        let err = session.run("exec /bin/true", true).await.unwrap_err();
        assert!(matches!(err, SwapError::ChannelClosed { .. }));
        session.close().await;
    }

    #[tokio::test]
    async fn test_unwaited_command_output_is_skipped() {
        let remote = FakeRemote::new().with_shell(echo_shell);
        let mut session = RemoteSession::open(&remote, &endpoint()).await.unwrap();

        session.run("background", false).await.unwrap();
        let (out, _) = session.run("next", true).await.unwrap();
        assert_eq!(out, "ran next\n");
        session.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let remote = FakeRemote::new();
        let mut session = RemoteSession::open(&remote, &endpoint()).await.unwrap();
        session.close().await;
        session.close().await;
        assert!(matches!(
            session.run("true", true).await,
            Err(SwapError::ChannelClosed { .. })
        ));
        assert!(!remote.events.snapshot().contains(&Event::Killed("session")));
    }

    #[tokio::test]
    async fn test_armed_channel_release_then_finish() {
        let remote = FakeRemote::new();
        let mut armed = ArmedChannel::open(&remote, &endpoint(), "/bin/fdctl set-identity k")
            .await
            .unwrap();
        armed.release().await;
        assert!(armed.is_released());
        armed.finish().await;

        let events = remote.events.snapshot();
        assert_eq!(
            events,
            vec![
                Event::ArmedOpened("read -r _ && exec /bin/fdctl set-identity k".into()),
                Event::Release,
                Event::StdinClosed,
            ]
        );
    }

    #[tokio::test]
    async fn test_unreleased_armed_channel_is_killed() {
        let remote = FakeRemote::new();
        let armed = ArmedChannel::open(&remote, &endpoint(), "cmd").await.unwrap();
        armed.finish().await;
        assert!(remote.events.snapshot().contains(&Event::Killed("armed")));
        assert!(!remote.events.snapshot().contains(&Event::Release));
    }
}

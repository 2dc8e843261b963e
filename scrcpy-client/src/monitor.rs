//! Shell output monitor for the server process.
//!
//! The server's stdout/stderr is the only place startup failures show up
//! before the sockets exist, and the process-exit record is an
//! independent liveness signal for the whole session: a dead server
//! always means a dead session, whatever the sockets claim.

use crate::device::{ShellEvent, ShellStream};
use crate::errors::ClientError;
use crate::messages::{FaultSource, SessionEvent};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Stdout markers the server prints once it is up.
const READY_MARKERS: &[&str] = &["INFO:", "Device:", "Encoder:"];

/// Stderr markers that mean startup already failed.
const FATAL_MARKERS: &[&str] = &["ERROR", "FATAL"];

/// Wait for the server's startup banner on its shell stream.
///
/// Scans output until a ready marker appears on stdout, a fatal marker
/// appears on stderr, the process exits, or the deadline passes.
///
/// # Errors
///
/// Returns `ServerStart` describing which of those it was.
pub async fn wait_for_server_ready(
    stream: &mut ShellStream,
    deadline: Duration,
) -> Result<(), ClientError> {
    let wait = async {
        while let Some(event) = stream.recv().await {
            match event {
                ShellEvent::Stdout(chunk) => {
                    for line in chunk_lines(&chunk) {
                        debug!(target: "scrcpy_server", "{line}");
                        if contains_any(&line, READY_MARKERS) {
                            return Ok(());
                        }
                    }
                }
                ShellEvent::Stderr(chunk) => {
                    for line in chunk_lines(&chunk) {
                        error!(target: "scrcpy_server", "{line}");
                        if contains_any(&line, FATAL_MARKERS) {
                            return Err(ClientError::ServerStart(line));
                        }
                    }
                }
                ShellEvent::Exit(code) => {
                    return Err(ClientError::ServerStart(format!(
                        "server exited during startup with code {code}"
                    )));
                }
            }
        }
        Err(ClientError::ServerStart(
            "shell stream closed during startup".to_string(),
        ))
    };

    match tokio::time::timeout(deadline, wait).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::ServerStart(format!(
            "server not ready after {deadline:?}"
        ))),
    }
}

/// Background monitor over the server's shell stream.
pub struct ShellMonitor {
    handle: JoinHandle<()>,
}

impl ShellMonitor {
    /// Spawn the monitor task.
    ///
    /// Lines are classified and forwarded as diagnostics; a process-exit
    /// record (any code) raises the same fault path the demuxers use.
    pub fn spawn(mut stream: ShellStream, events: flume::Sender<SessionEvent>) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                match stream.recv().await {
                    Some(ShellEvent::Stdout(chunk)) => {
                        for line in chunk_lines(&chunk) {
                            debug!(target: "scrcpy_server", "{line}");
                            let _ = events.send(SessionEvent::Diagnostic {
                                line,
                                from_stderr: false,
                            });
                        }
                    }
                    Some(ShellEvent::Stderr(chunk)) => {
                        for line in chunk_lines(&chunk) {
                            error!(target: "scrcpy_server", "{line}");
                            let _ = events.send(SessionEvent::Diagnostic {
                                line,
                                from_stderr: true,
                            });
                        }
                    }
                    Some(ShellEvent::Exit(code)) => {
                        warn!("server process exited with code {code}");
                        let _ = events.send(SessionEvent::ServerExited { code });
                        break;
                    }
                    None => {
                        // Transport dropped the stream without an exit
                        // record; treat it like a stream failure.
                        let _ = events.send(SessionEvent::StreamFault {
                            source: FaultSource::Server,
                            message: "shell stream closed".to_string(),
                        });
                        break;
                    }
                }
            }
        });

        Self { handle }
    }

    /// Stop the monitor. Idempotent; used on disconnect.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for ShellMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn chunk_lines(chunk: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(chunk)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_any(line: &str, markers: &[&str]) -> bool {
    let lower = line.to_lowercase();
    markers.iter().any(|m| lower.contains(&m.to_lowercase()))
}

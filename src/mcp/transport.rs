//! Stdio subprocess communicator.
//!
//! Runs the server under test as a child process and frames JSON-RPC
//! messages over its stdin/stdout. Two background tasks service the
//! child: a stdout framer that pushes classified [`ReaderEvent`]s into a
//! bounded queue, and a stderr collector that accumulates bytes into a
//! shared buffer (stderr is part of the observable surface — suites can
//! assert on it, and `readyPattern` waits on it).
//!
//! The orchestrator owns the send side and drives blocking pops with a
//! deadline on the event queue; tests never overlap, so writes are
//! serialized by construction.

use crate::config::ServerConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::mcp::framer::{self, Line};
use crate::mcp::protocol::Frame;
use regex::Regex;
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

/// Frames queue up here when the consumer is slow; the reader task backs
/// off once the queue is full rather than buffering unboundedly.
const FRAME_QUEUE_CAPACITY: usize = 64;

/// How long `stop()` waits for a voluntary exit before killing.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// How much stderr to attach to a `ServerExited` diagnostic.
const STDERR_TAIL_BYTES: usize = 2048;

/// Event stream produced by the stdout reader task.
#[derive(Debug)]
enum ReaderEvent {
    /// A complete JSON-RPC frame, in emission order.
    Frame(Frame),
    /// A stdout line that was not a frame (banner text and the like).
    Noise(String),
    /// The child closed its stdout.
    Eof,
}

/// Accumulated stderr of the child, shared with the collector task.
///
/// Bytes are stored raw and decoded lossily on read, so an invalid
/// sequence split across two reads never corrupts the decode.
#[derive(Clone, Default, Debug)]
pub struct StderrBuffer {
    inner: Arc<StderrShared>,
}

#[derive(Default, Debug)]
struct StderrShared {
    bytes: Mutex<Vec<u8>>,
    notify: Notify,
    closed: AtomicBool,
}

impl StderrBuffer {
    fn append(&self, chunk: &[u8]) {
        self.inner
            .bytes
            .lock()
            .expect("stderr buffer poisoned")
            .extend_from_slice(chunk);
        self.inner.notify.notify_waiters();
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Everything captured since the last clear, lossily decoded.
    #[must_use]
    pub fn snapshot(&self) -> String {
        let bytes = self.inner.bytes.lock().expect("stderr buffer poisoned");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Discards the captured bytes.
    pub fn clear(&self) {
        self.inner
            .bytes
            .lock()
            .expect("stderr buffer poisoned")
            .clear();
    }

    /// The trailing `max_bytes` of the buffer, for error diagnostics.
    #[must_use]
    pub fn tail(&self, max_bytes: usize) -> String {
        let bytes = self.inner.bytes.lock().expect("stderr buffer poisoned");
        let start = bytes.len().saturating_sub(max_bytes);
        String::from_utf8_lossy(&bytes[start..]).into_owned()
    }

    /// Waits until the buffer matches `pattern` or `deadline` passes.
    ///
    /// Returns `false` on deadline or when the stream closed without a
    /// match (no further output can arrive).
    pub async fn wait_for_match(&self, pattern: &Regex, deadline: Instant) -> bool {
        loop {
            if pattern.is_match(&self.snapshot()) {
                return true;
            }
            if self.inner.closed.load(Ordering::Acquire) {
                return false;
            }
            let notified = self.inner.notify.notified();
            // Re-check after arming the waiter so an append between the
            // first check and `notified()` cannot be missed.
            if pattern.is_match(&self.snapshot()) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }
}

/// Subprocess communicator for one MCP server session.
///
/// Owns the child exclusively. Single writer, single reader per stream;
/// created per suite run and destroyed on completion or on the first
/// unrecoverable I/O error.
#[derive(Debug)]
pub struct StdioTransport {
    config: ServerConfig,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    events: Option<mpsc::Receiver<ReaderEvent>>,
    stderr: StderrBuffer,
    noise: Vec<String>,
}

impl StdioTransport {
    /// Creates an unstarted transport for the configured server.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            child: None,
            stdin: None,
            events: None,
            stderr: StderrBuffer::default(),
            noise: Vec::new(),
        }
    }

    /// Spawns the server and starts the reader tasks.
    ///
    /// When `readyPattern` is configured, waits until stderr matches it
    /// or `startupTimeoutMs` elapses.
    ///
    /// # Errors
    ///
    /// [`HarnessError::LaunchFailed`] when the spawn fails,
    /// [`HarnessError::StartupTimeout`] when readiness never arrives.
    pub async fn start(&mut self) -> HarnessResult<()> {
        if self.child.is_some() {
            return Err(HarnessError::TransportClosed {
                reason: String::from("transport already started"),
            });
        }

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| HarnessError::LaunchFailed {
            command: self.config.command.clone(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| HarnessError::LaunchFailed {
            command: self.config.command.clone(),
            reason: String::from("child stdin not piped"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| HarnessError::LaunchFailed {
            command: self.config.command.clone(),
            reason: String::from("child stdout not piped"),
        })?;
        let child_stderr = child.stderr.take().ok_or_else(|| HarnessError::LaunchFailed {
            command: self.config.command.clone(),
            reason: String::from("child stderr not piped"),
        })?;

        tracing::debug!(
            server = %self.config.name,
            command = %self.config.command,
            "spawned server process"
        );

        let (tx, rx) = mpsc::channel::<ReaderEvent>(FRAME_QUEUE_CAPACITY);

        // Stdout framer task.
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        let _ = tx.send(ReaderEvent::Eof).await;
                        break;
                    }
                    Ok(_) => match framer::classify_line(&line) {
                        Line::Frame(frame) => {
                            if tx.send(ReaderEvent::Frame(frame)).await.is_err() {
                                break;
                            }
                        }
                        Line::Noise(text) => {
                            tracing::warn!(line = %text, "discarding non-frame stdout line");
                            if tx.send(ReaderEvent::Noise(text)).await.is_err() {
                                break;
                            }
                        }
                        Line::Blank => {}
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "stdout read failed");
                        let _ = tx.send(ReaderEvent::Eof).await;
                        break;
                    }
                }
            }
        });

        // Stderr collector task.
        let stderr_buffer = self.stderr.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(child_stderr);
            let mut chunk = [0u8; 4096];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => {
                        stderr_buffer.close();
                        break;
                    }
                    Ok(n) => stderr_buffer.append(&chunk[..n]),
                }
            }
        });

        self.child = Some(child);
        self.stdin = Some(BufWriter::new(stdin));
        self.events = Some(rx);

        if let Some(pattern) = self.config.ready_regex() {
            let deadline = Instant::now() + self.config.startup_timeout();
            if !self.stderr.wait_for_match(&pattern, deadline).await {
                let timeout_ms = self.config.startup_timeout_ms;
                self.stop().await;
                return Err(HarnessError::StartupTimeout { timeout_ms });
            }
        }

        Ok(())
    }

    /// Serializes `frame` as one line on the child's stdin and flushes.
    ///
    /// # Errors
    ///
    /// [`HarnessError::TransportClosed`] on any write failure.
    pub async fn send_message(&mut self, frame: &Value) -> HarnessResult<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| HarnessError::TransportClosed {
            reason: String::from("transport not started"),
        })?;
        framer::write_frame(stdin, frame)
            .await
            .map_err(|e| HarnessError::TransportClosed {
                reason: e.to_string(),
            })
    }

    /// Returns the next frame from stdout, in emission order.
    ///
    /// Noise lines encountered along the way are retained for
    /// [`Self::take_noise`]. A frame that arrived before a previous
    /// read's deadline expired is still returned here, in order.
    ///
    /// # Errors
    ///
    /// [`HarnessError::ReadTimeout`] when nothing arrives in time,
    /// [`HarnessError::ServerExited`] when the child is gone.
    pub async fn read_message(&mut self, timeout: Duration) -> HarnessResult<Frame> {
        let deadline = Instant::now() + timeout;
        loop {
            let events = self.events.as_mut().ok_or_else(|| HarnessError::TransportClosed {
                reason: String::from("transport not started"),
            })?;
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Some(ReaderEvent::Frame(frame))) => return Ok(frame),
                Ok(Some(ReaderEvent::Noise(text))) => self.noise.push(text),
                Ok(Some(ReaderEvent::Eof)) | Ok(None) => return Err(self.exited().await),
                Err(_) => {
                    return Err(HarnessError::ReadTimeout {
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
            }
        }
    }

    /// Builds the `ServerExited` error once stdout has closed.
    async fn exited(&mut self) -> HarnessError {
        let code = match self.child.as_mut() {
            Some(child) => {
                match tokio::time::timeout(Duration::from_millis(500), child.wait()).await {
                    Ok(Ok(status)) => status.code(),
                    _ => None,
                }
            }
            None => None,
        };
        HarnessError::ServerExited {
            code,
            stderr_tail: self.stderr.tail(STDERR_TAIL_BYTES),
        }
    }

    /// Stops the child: closes stdin, waits up to a grace period, then
    /// kills and reaps. Idempotent.
    pub async fn stop(&mut self) {
        // Closing stdin is the polite shutdown signal for stdio servers.
        drop(self.stdin.take());
        self.events.take();

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(STOP_GRACE, child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!(server = %self.config.name, ?status, "server exited");
                }
                Ok(Err(e)) => {
                    tracing::warn!(server = %self.config.name, error = %e, "wait failed");
                }
                Err(_) => {
                    tracing::warn!(server = %self.config.name, "grace period elapsed, killing");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }
    }

    /// Handle to the shared stderr buffer.
    #[must_use]
    pub fn stderr(&self) -> StderrBuffer {
        self.stderr.clone()
    }

    /// Drains the noise lines recorded since the last call.
    pub fn take_noise(&mut self) -> Vec<String> {
        std::mem::take(&mut self.noise)
    }

    /// The config this transport was built from.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

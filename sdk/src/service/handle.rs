//! Command handle
//!
//! A handle owns one event stream and exactly one consumer task reading it.
//! The task appends output to the handle's buffers, runs the caller's
//! callbacks in event order and publishes the final [`HandleState`].
//!
//! ```text
//! Streaming ──end──────────> Completed
//!     │ ────stream error───> Faulted
//!     └─────disconnect()───> Detached
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::types::{CommandResult, ProcessEvent, ProcessOutput};
use crate::error::{Error, Result};
use crate::infra::transport::EventStream;
use crate::service::commands::Commands;

/// Callback receiving decoded stdout or stderr chunks
pub type OutputCallback = Box<dyn FnMut(&str) + Send + 'static>;

/// Callback receiving raw terminal bytes
pub type PtyCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

#[derive(Default)]
pub(crate) struct Callbacks {
    pub on_stdout: Option<OutputCallback>,
    pub on_stderr: Option<OutputCallback>,
    pub on_pty: Option<PtyCallback>,
}

/// Lifecycle of a handle
#[derive(Debug, Clone)]
pub enum HandleState {
    /// Events are still being consumed
    Streaming,
    /// The stream delivered `end`
    Completed(CommandResult),
    /// The stream failed before `end`
    Faulted(Error),
    /// The caller stopped observing before `end`
    Detached,
}

impl HandleState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HandleState::Streaming)
    }
}

#[derive(Debug, Default)]
struct Output {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// One attachment to a remote process's event stream
pub struct CommandHandle {
    pid: u32,
    commands: Commands,
    output: Arc<RwLock<Output>>,
    state: watch::Receiver<HandleState>,
    cancel: CancellationToken,
}

impl CommandHandle {
    /// Take ownership of `events` and start consuming them immediately
    pub(crate) fn spawn(
        pid: u32,
        events: EventStream,
        commands: Commands,
        callbacks: Callbacks,
    ) -> Self {
        let output = Arc::new(RwLock::new(Output::default()));
        let (state_tx, state_rx) = watch::channel(HandleState::Streaming);
        let cancel = CancellationToken::new();

        tokio::spawn(consume(
            pid,
            events,
            output.clone(),
            callbacks,
            state_tx,
            cancel.clone(),
        ));

        Self {
            pid,
            commands,
            output,
            state: state_rx,
            cancel,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Stdout received so far
    pub async fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.read().await.stdout).into_owned()
    }

    /// Stderr received so far
    pub async fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.read().await.stderr).into_owned()
    }

    pub fn state(&self) -> HandleState {
        self.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    /// Wait for the process to finish.
    ///
    /// Nonzero exit codes become [`Error::CommandExit`] carrying the full
    /// result. Calling this repeatedly yields the same outcome.
    pub async fn wait(&self) -> Result<CommandResult> {
        let mut state = self.state.clone();
        let state = state
            .wait_for(HandleState::is_terminal)
            .await
            .map_err(|_| Error::Sandbox("command handle task ended unexpectedly".to_string()))?
            .clone();

        match state {
            HandleState::Completed(result) if result.exit_code == 0 => Ok(result),
            HandleState::Completed(result) => Err(Error::CommandExit(result)),
            HandleState::Faulted(err) => Err(err),
            HandleState::Detached => Err(Error::Sandbox(format!(
                "handle for process {} was disconnected before the process exited",
                self.pid
            ))),
            HandleState::Streaming => Err(Error::Sandbox(
                "command handle is still streaming".to_string(),
            )),
        }
    }

    /// Stop observing the process; the process keeps running.
    pub fn disconnect(&self) {
        if !self.cancel.is_cancelled() {
            info!("Disconnecting from process {}", self.pid);
            self.cancel.cancel();
        }
    }

    /// Kill the process. The handle notices once the stream reports the exit.
    pub async fn kill(&self) -> Result<bool> {
        self.commands.kill(self.pid).await
    }

    /// Write to the process's stdin
    pub async fn send_stdin(&self, data: impl Into<Bytes>) -> Result<()> {
        self.commands.send_stdin(self.pid, data).await
    }
}

impl std::fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandle")
            .field("pid", &self.pid)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

async fn consume(
    pid: u32,
    mut events: EventStream,
    output: Arc<RwLock<Output>>,
    mut callbacks: Callbacks,
    state: watch::Sender<HandleState>,
    cancel: CancellationToken,
) {
    let mut decoders = Decoders::default();

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break HandleState::Detached,
            next = events.next() => next,
        };

        match next {
            Some(Ok(ProcessEvent::Data(data))) => {
                dispatch(pid, data, &output, &mut callbacks, &mut decoders).await;
            }
            Some(Ok(ProcessEvent::End { exit_code, error })) => {
                flush(pid, &mut callbacks, &mut decoders);
                let output = output.read().await;
                break HandleState::Completed(CommandResult {
                    exit_code,
                    error,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }
            Some(Ok(ProcessEvent::Start { pid: started })) => {
                debug!("Process {} acknowledged as pid {}", pid, started);
            }
            Some(Ok(ProcessEvent::Keepalive)) => {}
            Some(Err(status)) => break HandleState::Faulted(Error::from(status)),
            None => {
                break HandleState::Faulted(Error::Protocol(format!(
                    "event stream for process {} ended without an end event",
                    pid
                )))
            }
        }
    };

    match &outcome {
        HandleState::Completed(result) => {
            debug!("Process {} exited with code {}", pid, result.exit_code)
        }
        HandleState::Faulted(err) => debug!("Process {} stream failed: {}", pid, err),
        HandleState::Detached => debug!("Stopped consuming events of process {}", pid),
        HandleState::Streaming => {}
    }

    state.send_replace(outcome);
}

/// Holds back an incomplete UTF-8 sequence at the end of a chunk until the
/// rest of it arrives, so callbacks never see a character split in two
#[derive(Debug, Default)]
struct Utf8Tail {
    pending: Vec<u8>,
}

impl Utf8Tail {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Only an unfinished sequence at the very end is held back
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let rest = self.pending.split_off(complete);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        text
    }

    fn flush(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

#[derive(Default)]
struct Decoders {
    stdout: Utf8Tail,
    stderr: Utf8Tail,
}

/// Append one chunk and hand it to the matching callback
async fn dispatch(
    pid: u32,
    data: ProcessOutput,
    output: &RwLock<Output>,
    callbacks: &mut Callbacks,
    decoders: &mut Decoders,
) {
    match data {
        ProcessOutput::Stdout(chunk) => {
            output.write().await.stdout.extend_from_slice(&chunk);
            if let Some(callback) = callbacks.on_stdout.as_mut() {
                let text = decoders.stdout.decode(&chunk);
                if !text.is_empty() {
                    guarded(pid, "stdout", || callback(&text));
                }
            }
        }
        ProcessOutput::Stderr(chunk) => {
            output.write().await.stderr.extend_from_slice(&chunk);
            if let Some(callback) = callbacks.on_stderr.as_mut() {
                let text = decoders.stderr.decode(&chunk);
                if !text.is_empty() {
                    guarded(pid, "stderr", || callback(&text));
                }
            }
        }
        ProcessOutput::Pty(chunk) => {
            if let Some(callback) = callbacks.on_pty.as_mut() {
                guarded(pid, "pty", || callback(&chunk));
            }
        }
    }
}

/// Deliver whatever bytes are still held back once the stream has ended
fn flush(pid: u32, callbacks: &mut Callbacks, decoders: &mut Decoders) {
    let text = decoders.stdout.flush();
    match callbacks.on_stdout.as_mut() {
        Some(callback) if !text.is_empty() => guarded(pid, "stdout", || callback(&text)),
        _ => {}
    }
    let text = decoders.stderr.flush();
    match callbacks.on_stderr.as_mut() {
        Some(callback) if !text.is_empty() => guarded(pid, "stderr", || callback(&text)),
        _ => {}
    }
}

/// Callback panics are logged and swallowed so later events still flow
fn guarded(pid: u32, stream: &str, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        warn!("{} callback for process {} panicked, event dropped", stream, pid);
    }
}

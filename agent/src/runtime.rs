//! Loopback process runtime
//!
//! Every process gets a broadcast channel; each start or connect stream is a
//! forwarding task subscribed to it, so observers only see output produced
//! after they attach. Entries leave the table just before `end` is published.
//! An observer that falls further behind than the per-process buffer loses
//! its stream with `DataLoss` rather than seeing a gap followed by `end`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use envd_sdk::auth::{parse_authentication_header, AUTHORIZATION_HEADER};
use envd_sdk::{
    CallContext, ConnectionConfig, EnvdClient, EventStream, ProcessDescriptor, ProcessEvent,
    ProcessInput, ProcessTransport, PtySize, Signal, StartSpec,
};
use semver::Version;
use tokio::process::ChildStdin;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::Status;
use tracing::{debug, info, warn};

use crate::config::LoopbackConfig;
use crate::handlers::process::{self, PipedProcess};
use crate::handlers::pty::{self, PtyProcess, PtyTerminal};

const STREAM_BUFFER: usize = 64;

enum ProcessIo {
    Piped { stdin: Mutex<Option<ChildStdin>> },
    Pty(PtyTerminal),
}

struct ProcessEntry {
    descriptor: ProcessDescriptor,
    events: broadcast::Sender<ProcessEvent>,
    io: ProcessIo,
}

/// In-process envd serving the process surface with local processes
#[derive(Clone)]
pub struct LoopbackEnvd {
    config: Arc<LoopbackConfig>,
    processes: Arc<DashMap<u32, Arc<ProcessEntry>>>,
}

impl Default for LoopbackEnvd {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

impl LoopbackEnvd {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config: Arc::new(config),
            processes: Arc::new(DashMap::new()),
        }
    }

    pub fn envd_version(&self) -> &Version {
        &self.config.envd_version
    }

    /// Number of processes still running
    pub fn running(&self) -> usize {
        self.processes.len()
    }

    /// SDK client talking to this runtime
    pub fn client(&self, config: ConnectionConfig) -> EnvdClient {
        EnvdClient::with_transport(
            Arc::new(self.clone()),
            config,
            Some(self.config.envd_version.clone()),
        )
    }

    fn entry(&self, pid: u32) -> Result<Arc<ProcessEntry>, Status> {
        self.processes
            .get(&pid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Status::not_found(format!("process with pid {} not found", pid)))
    }

    fn spawn(&self, spec: &StartSpec) -> anyhow::Result<(u32, broadcast::Receiver<ProcessEvent>)> {
        let (events, receiver) = broadcast::channel(self.config.event_buffer);

        // Register the entry before watching for exit so `finish` always finds it
        match spec.pty {
            Some(size) => {
                let PtyProcess {
                    pid,
                    terminal,
                    child,
                    reader,
                } = pty::spawn_pty(spec, size, events.clone())?;
                self.register(pid, spec, events.clone(), ProcessIo::Pty(terminal));
                self.watch_pty(pid, child, reader, events);
                Ok((pid, receiver))
            }
            None => {
                let PipedProcess {
                    pid,
                    child,
                    stdin,
                    pumps,
                } = process::spawn_piped(spec, events.clone())?;
                let io = ProcessIo::Piped {
                    stdin: Mutex::new(stdin),
                };
                self.register(pid, spec, events.clone(), io);
                self.watch_piped(pid, child, pumps, events);
                Ok((pid, receiver))
            }
        }
    }

    fn register(
        &self,
        pid: u32,
        spec: &StartSpec,
        events: broadcast::Sender<ProcessEvent>,
        io: ProcessIo,
    ) {
        let descriptor = ProcessDescriptor {
            pid,
            tag: spec.tag.clone(),
            cmd: spec.cmd.clone(),
            args: spec.args.clone(),
            envs: spec.envs.clone(),
            cwd: spec.cwd.clone(),
        };
        self.processes.insert(
            pid,
            Arc::new(ProcessEntry {
                descriptor,
                events,
                io,
            }),
        );
    }

    fn watch_piped(
        &self,
        pid: u32,
        mut child: tokio::process::Child,
        pumps: Vec<tokio::task::JoinHandle<()>>,
        events: broadcast::Sender<ProcessEvent>,
    ) {
        let processes = self.processes.clone();
        let drain_timeout = self.config.drain_timeout;

        tokio::spawn(async move {
            let end = match child.wait().await {
                Ok(status) => process::exit_event(status),
                Err(e) => ProcessEvent::End {
                    exit_code: -1,
                    error: Some(e.to_string()),
                },
            };
            process::drain(pumps, drain_timeout).await;
            finish(&processes, pid, end, &events);
        });
    }

    fn watch_pty(
        &self,
        pid: u32,
        mut child: Box<dyn portable_pty::Child + Send + Sync>,
        reader: tokio::task::JoinHandle<()>,
        events: broadcast::Sender<ProcessEvent>,
    ) {
        let processes = self.processes.clone();
        let drain_timeout = self.config.drain_timeout;

        tokio::spawn(async move {
            let end = match tokio::task::spawn_blocking(move || child.wait()).await {
                Ok(status) => pty::exit_event(status),
                Err(e) => ProcessEvent::End {
                    exit_code: -1,
                    error: Some(e.to_string()),
                },
            };
            if tokio::time::timeout(drain_timeout, reader).await.is_err() {
                debug!("Terminal of process {} still open after exit", pid);
            }
            finish(&processes, pid, end, &events);
        });
    }

    /// Stream the events of `pid` to one observer.
    ///
    /// With a lifetime the stream fails with `DeadlineExceeded` once it
    /// passes; `owner` streams also kill the process at that point.
    fn forward(
        &self,
        pid: u32,
        mut receiver: broadcast::Receiver<ProcessEvent>,
        lifetime: Option<Duration>,
        owner: bool,
    ) -> EventStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let expiry = lifetime.map(|lifetime| Instant::now() + lifetime);

        tokio::spawn(async move {
            if tx.send(Ok(ProcessEvent::Start { pid })).await.is_err() {
                return;
            }

            loop {
                let received = tokio::select! {
                    _ = tx.closed() => {
                        debug!("Observer of process {} went away", pid);
                        break;
                    }
                    _ = expired(expiry) => {
                        info!("Process {} outlived its stream lifetime", pid);
                        if owner {
                            if let Err(e) = process::kill_process(pid, Signal::Kill) {
                                warn!("Failed to kill expired process {}: {}", pid, e);
                            }
                        }
                        let _ = tx
                            .send(Err(Status::deadline_exceeded("stream lifetime exceeded")))
                            .await;
                        break;
                    }
                    received = receiver.recv() => received,
                };

                match received {
                    Ok(event) => {
                        let end = matches!(event, ProcessEvent::End { .. });
                        if tx.send(Ok(event)).await.is_err() || end {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Observer of process {} lagged, {} events dropped", pid, skipped);
                        let _ = tx
                            .send(Err(Status::data_loss(format!(
                                "observer fell behind, {} events of process {} dropped",
                                skipped, pid
                            ))))
                            .await;
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

/// Drop the table entry, then publish the terminal event
fn finish(
    processes: &DashMap<u32, Arc<ProcessEntry>>,
    pid: u32,
    end: ProcessEvent,
    events: &broadcast::Sender<ProcessEvent>,
) {
    processes.remove(&pid);
    debug!("Process {} finished: {:?}", pid, end);
    let _ = events.send(end);
}

async fn expired(expiry: Option<Instant>) {
    match expiry {
        Some(expiry) => tokio::time::sleep_until(expiry).await,
        None => std::future::pending().await,
    }
}

fn authenticate(metadata: &MetadataMap) -> Result<String, Status> {
    metadata
        .get(AUTHORIZATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authentication_header)
        .ok_or_else(|| Status::unauthenticated("missing or malformed authorization header"))
}

fn internal(err: anyhow::Error) -> Status {
    Status::internal(err.to_string())
}

#[async_trait]
impl ProcessTransport for LoopbackEnvd {
    async fn list(&self, ctx: CallContext) -> Result<Vec<ProcessDescriptor>, Status> {
        authenticate(&ctx.metadata)?;
        Ok(self
            .processes
            .iter()
            .map(|entry| entry.value().descriptor.clone())
            .collect())
    }

    async fn start(&self, ctx: CallContext, spec: StartSpec) -> Result<EventStream, Status> {
        let user = authenticate(&ctx.metadata)?;

        if !self.config.start_delay.is_zero() {
            tokio::time::sleep(self.config.start_delay).await;
        }

        let (pid, receiver) = self.spawn(&spec).map_err(internal)?;
        info!(
            "Started process {} for {}: {} {:?}",
            pid, user, spec.cmd, spec.args
        );

        Ok(self.forward(pid, receiver, ctx.timeout, true))
    }

    async fn connect(&self, ctx: CallContext, pid: u32) -> Result<EventStream, Status> {
        authenticate(&ctx.metadata)?;

        // Subscribe under the shard lock so `end` cannot slip past
        let receiver = self
            .processes
            .get(&pid)
            .map(|entry| entry.value().events.subscribe())
            .ok_or_else(|| Status::not_found(format!("process with pid {} not found", pid)))?;

        info!("Observer attached to process {}", pid);
        Ok(self.forward(pid, receiver, ctx.timeout, false))
    }

    async fn send_input(
        &self,
        ctx: CallContext,
        pid: u32,
        input: ProcessInput,
    ) -> Result<(), Status> {
        authenticate(&ctx.metadata)?;
        let entry = self.entry(pid)?;

        match (&entry.io, input) {
            (ProcessIo::Piped { stdin }, ProcessInput::Stdin(data)) => {
                use tokio::io::AsyncWriteExt;

                let mut stdin = stdin.lock().await;
                let pipe = stdin
                    .as_mut()
                    .ok_or_else(|| Status::failed_precondition("stdin is not open"))?;
                pipe.write_all(&data)
                    .await
                    .map_err(|e| Status::internal(format!("failed to write stdin: {}", e)))?;
                pipe.flush()
                    .await
                    .map_err(|e| Status::internal(format!("failed to flush stdin: {}", e)))?;
            }
            (ProcessIo::Piped { .. }, ProcessInput::Pty(_)) => {
                return Err(Status::invalid_argument(format!(
                    "process {} has no terminal",
                    pid
                )));
            }
            (ProcessIo::Pty(terminal), ProcessInput::Pty(data) | ProcessInput::Stdin(data)) => {
                terminal.write(&data).map_err(internal)?;
            }
        }

        debug!("Delivered input to process {}", pid);
        Ok(())
    }

    async fn send_signal(&self, ctx: CallContext, pid: u32, signal: Signal) -> Result<(), Status> {
        authenticate(&ctx.metadata)?;
        self.entry(pid)?;

        info!("Sending {:?} to process {}", signal, pid);
        process::kill_process(pid, signal).map_err(internal)
    }

    async fn update(&self, ctx: CallContext, pid: u32, size: PtySize) -> Result<(), Status> {
        authenticate(&ctx.metadata)?;
        let entry = self.entry(pid)?;

        match &entry.io {
            ProcessIo::Pty(terminal) => {
                debug!("Resizing terminal of process {} to {}x{}", pid, size.cols, size.rows);
                terminal
                    .resize(size)
                    .map_err(|e| Status::invalid_argument(e.to_string()))
            }
            ProcessIo::Piped { .. } => Err(Status::invalid_argument(format!(
                "process {} has no terminal",
                pid
            ))),
        }
    }
}

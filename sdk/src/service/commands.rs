//! Command service

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use semver::Version;
use tonic::Status;
use tracing::{debug, info};

use crate::auth;
use crate::config::{ConnectionConfig, DEFAULT_COMMAND_TIMEOUT};
use crate::domain::capability::{self, ENVD_COMMANDS_STDIN};
use crate::domain::types::{
    CommandResult, ProcessDescriptor, ProcessEvent, ProcessInput, PtySize, Signal, StartSpec,
};
use crate::error::{Error, Result};
use crate::infra::transport::{CallContext, EventStream, ProcessTransport};
use crate::service::handle::{Callbacks, CommandHandle, OutputCallback};

/// Options for starting a command
#[derive(Default)]
pub struct CommandOptions {
    /// Working directory
    pub cwd: Option<String>,
    /// Sandbox user to run as (default `user`)
    pub user: Option<String>,
    /// Environment variables
    pub envs: HashMap<String, String>,
    /// Tag envd stores with the process and reports from `list`
    pub tag: Option<String>,
    /// Lifetime bound enforced by envd (default 60s, zero disables)
    pub timeout: Option<Duration>,
    /// Bound on waiting for the start acknowledgment
    pub request_timeout: Option<Duration>,
    /// Keep stdin open (envd default); `false` needs envd 0.3.0
    pub stdin: Option<bool>,
    pub on_stdout: Option<OutputCallback>,
    pub on_stderr: Option<OutputCallback>,
}

impl CommandOptions {
    pub fn on_stdout(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stdout = Some(Box::new(callback));
        self
    }

    pub fn on_stderr(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stderr = Some(Box::new(callback));
        self
    }
}

/// Options for attaching to a running command
#[derive(Default)]
pub struct ConnectOptions {
    /// Lifetime bound enforced by envd (default 60s, zero disables)
    pub timeout: Option<Duration>,
    /// Bound on waiting for the stream to open
    pub request_timeout: Option<Duration>,
    pub on_stdout: Option<OutputCallback>,
    pub on_stderr: Option<OutputCallback>,
}

/// Command service for starting and steering processes inside a sandbox
///
/// Cheap to clone; holds no per-process state.
#[derive(Clone)]
pub struct Commands {
    transport: Arc<dyn ProcessTransport>,
    config: Arc<ConnectionConfig>,
    envd_version: Option<Version>,
}

impl Commands {
    /// Create a new command service
    pub fn new(
        transport: Arc<dyn ProcessTransport>,
        config: Arc<ConnectionConfig>,
        envd_version: Option<Version>,
    ) -> Self {
        Self {
            transport,
            config,
            envd_version,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn envd_version(&self) -> Option<&Version> {
        self.envd_version.as_ref()
    }

    /// List processes envd is running, including ones started elsewhere
    pub async fn list(&self) -> Result<Vec<ProcessDescriptor>> {
        let ctx = self.context(None, None)?;
        let processes = self.bounded(None, self.transport.list(ctx)).await?;
        debug!("Listed {} processes", processes.len());
        Ok(processes)
    }

    /// Start `cmd` in a login bash shell and return a handle streaming its output
    pub async fn start(&self, cmd: &str, opts: CommandOptions) -> Result<CommandHandle> {
        if opts.stdin == Some(false) {
            capability::require(
                "disabling stdin",
                &ENVD_COMMANDS_STDIN,
                self.envd_version.as_ref(),
            )?;
        }

        let ctx = self.context(opts.user.as_deref(), Some(lifetime(opts.timeout)))?;
        let spec = StartSpec {
            cmd: "/bin/bash".to_string(),
            args: vec!["-l".to_string(), "-c".to_string(), cmd.to_string()],
            envs: opts.envs,
            cwd: opts.cwd,
            tag: opts.tag,
            pty: None,
            stdin: opts.stdin,
        };

        info!("Starting command: {}", cmd);

        let (pid, events) = self.open_started(ctx, spec, opts.request_timeout).await?;

        info!("Command started with pid {}", pid);

        Ok(CommandHandle::spawn(
            pid,
            events,
            self.clone(),
            Callbacks {
                on_stdout: opts.on_stdout,
                on_stderr: opts.on_stderr,
                on_pty: None,
            },
        ))
    }

    /// Start `cmd` and wait for it to finish
    pub async fn run(&self, cmd: &str, opts: CommandOptions) -> Result<CommandResult> {
        self.start(cmd, opts).await?.wait().await
    }

    /// Attach a new handle to a running process.
    ///
    /// Only output produced after attaching is observed.
    pub async fn connect(&self, pid: u32, opts: ConnectOptions) -> Result<CommandHandle> {
        let events = self
            .open_connected(pid, opts.timeout, opts.request_timeout)
            .await?;

        Ok(CommandHandle::spawn(
            pid,
            events,
            self.clone(),
            Callbacks {
                on_stdout: opts.on_stdout,
                on_stderr: opts.on_stderr,
                on_pty: None,
            },
        ))
    }

    /// Send SIGKILL to a process.
    ///
    /// Returns `false` when envd does not know the pid.
    pub async fn kill(&self, pid: u32) -> Result<bool> {
        info!("Killing process {}", pid);

        let ctx = self.context(None, None)?;
        match self
            .bounded(None, self.transport.send_signal(ctx, pid, Signal::Kill))
            .await
        {
            Ok(()) => Ok(true),
            Err(Error::NotFound(_)) => {
                debug!("Process {} not found, nothing to kill", pid);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Deliver input to a process
    pub async fn send_input(&self, pid: u32, input: ProcessInput) -> Result<()> {
        let ctx = self.context(None, None)?;
        self.bounded(None, self.transport.send_input(ctx, pid, input)).await
    }

    /// Write to a process's stdin
    pub async fn send_stdin(&self, pid: u32, data: impl Into<Bytes>) -> Result<()> {
        self.send_input(pid, ProcessInput::Stdin(data.into())).await
    }

    /// Change the terminal size of a PTY process
    pub async fn resize(&self, pid: u32, size: PtySize) -> Result<()> {
        debug!("Resizing process {} to {}x{}", pid, size.cols, size.rows);

        let ctx = self.context(None, None)?;
        self.bounded(None, self.transport.update(ctx, pid, size)).await
    }

    /// Open a start stream and wait for its acknowledgment.
    ///
    /// The request deadline covers opening the stream and the first event;
    /// it is disarmed as soon as the `start` event arrives.
    pub(crate) async fn open_started(
        &self,
        ctx: CallContext,
        spec: StartSpec,
        request_timeout: Option<Duration>,
    ) -> Result<(u32, EventStream)> {
        let mut deadline = self.config.deadline(request_timeout);

        let acknowledged = async {
            let mut events = self.transport.start(ctx, spec).await?;
            match events.next().await {
                Some(Ok(ProcessEvent::Start { pid })) => Ok((pid, events)),
                Some(Ok(other)) => Err(Error::Protocol(format!(
                    "expected start event, got {}",
                    other.kind()
                ))),
                Some(Err(status)) => Err(Error::from(status)),
                None => Err(Error::Protocol(
                    "stream ended before the start event".to_string(),
                )),
            }
        };

        let result = tokio::select! {
            biased;
            result = acknowledged => result,
            _ = deadline.expired() => Err(Error::from(Status::cancelled(
                "no start event before the request deadline",
            ))),
        };

        deadline.disarm();
        result
    }

    /// Open a connect stream; the first event is left for the handle.
    pub(crate) async fn open_connected(
        &self,
        pid: u32,
        timeout: Option<Duration>,
        request_timeout: Option<Duration>,
    ) -> Result<EventStream> {
        info!("Connecting to process {}", pid);

        let ctx = self.context(None, Some(lifetime(timeout)))?;
        self.bounded(request_timeout, self.transport.connect(ctx, pid)).await
    }

    pub(crate) fn context(
        &self,
        user: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<CallContext> {
        Ok(CallContext {
            metadata: auth::request_metadata(&self.config.headers(), user)?,
            timeout: timeout.filter(|t| !t.is_zero()),
        })
    }

    /// Run a unary call under the request deadline
    async fn bounded<T, F>(&self, request_timeout: Option<Duration>, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, Status>>,
    {
        let deadline = self.config.deadline(request_timeout);
        tokio::select! {
            biased;
            result = call => result.map_err(Error::from),
            _ = deadline.expired() => Err(Error::from(Status::cancelled(
                "no response before the request deadline",
            ))),
        }
    }
}

/// Effective lifetime bound for a stream
pub(crate) fn lifetime(timeout: Option<Duration>) -> Duration {
    timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::stream;
    use mockall::predicate::eq;

    use super::*;
    use crate::config::ConnectionOptions;
    use crate::domain::types::ProcessOutput;
    use crate::error::TimeoutKind;
    use crate::infra::transport::MockProcessTransport;

    fn commands(transport: MockProcessTransport, version: Option<&str>) -> Commands {
        let config = ConnectionConfig::resolve(ConnectionOptions::default(), |_| None);
        Commands::new(
            Arc::new(transport),
            Arc::new(config),
            version.map(|v| Version::parse(v).unwrap()),
        )
    }

    fn events(items: Vec<std::result::Result<ProcessEvent, Status>>) -> EventStream {
        Box::pin(stream::iter(items))
    }

    fn stdout(text: &str) -> std::result::Result<ProcessEvent, Status> {
        Ok(ProcessEvent::Data(ProcessOutput::Stdout(Bytes::from(text.to_string()))))
    }

    #[tokio::test]
    async fn test_start_wraps_command_in_login_shell() {
        let captured = Arc::new(Mutex::new(None));
        let seen = captured.clone();

        let mut transport = MockProcessTransport::new();
        transport.expect_start().times(1).returning(move |ctx, spec| {
            *seen.lock().unwrap() = Some((ctx, spec));
            Ok(events(vec![
                Ok(ProcessEvent::Start { pid: 11 }),
                stdout("hello"),
                Ok(ProcessEvent::End {
                    exit_code: 0,
                    error: None,
                }),
            ]))
        });

        let commands = commands(transport, None);
        let opts = CommandOptions {
            cwd: Some("/tmp".to_string()),
            user: Some("root".to_string()),
            ..Default::default()
        };
        let handle = commands.start("printf hello", opts).await.unwrap();
        assert_eq!(handle.pid(), 11);

        let result = handle.wait().await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "hello");
        assert_eq!(result.stderr, "");

        let (ctx, spec) = captured.lock().unwrap().take().unwrap();
        assert_eq!(spec.cmd, "/bin/bash");
        assert_eq!(spec.args, vec!["-l", "-c", "printf hello"]);
        assert_eq!(spec.cwd.as_deref(), Some("/tmp"));
        assert!(spec.pty.is_none());
        assert_eq!(ctx.timeout, Some(DEFAULT_COMMAND_TIMEOUT));
        assert_eq!(
            ctx.metadata.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Basic cm9vdDo=")
        );
    }

    #[tokio::test]
    async fn test_start_rejects_non_start_first_event() {
        let mut transport = MockProcessTransport::new();
        transport
            .expect_start()
            .returning(|_, _| Ok(events(vec![stdout("early")])));

        let commands = commands(transport, None);
        let err = commands
            .start("echo hi", CommandOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_start_times_out_without_acknowledgment() {
        let mut transport = MockProcessTransport::new();
        transport.expect_start().returning(|_, _| {
            let pending = stream::pending::<std::result::Result<ProcessEvent, Status>>();
            Ok(Box::pin(pending) as EventStream)
        });

        let commands = commands(transport, None);
        let opts = CommandOptions {
            request_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };

        let started = std::time::Instant::now();
        let err = commands.start("sleep 10", opts).await.unwrap_err();
        assert_eq!(err.timeout_kind(), Some(TimeoutKind::Request));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_stdin_false_needs_new_envd() {
        let mut transport = MockProcessTransport::new();
        transport.expect_start().times(0);

        let commands = commands(transport, Some("0.2.9"));
        let opts = CommandOptions {
            stdin: Some(false),
            ..Default::default()
        };
        let err = commands.start("cat", opts).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_stdin_false_forwarded_on_new_envd() {
        let mut transport = MockProcessTransport::new();
        transport
            .expect_start()
            .withf(|_, spec| spec.stdin == Some(false))
            .returning(|_, _| {
                Ok(events(vec![
                    Ok(ProcessEvent::Start { pid: 3 }),
                    Ok(ProcessEvent::End {
                        exit_code: 0,
                        error: None,
                    }),
                ]))
            });

        let commands = commands(transport, Some("0.3.0"));
        let opts = CommandOptions {
            stdin: Some(false),
            ..Default::default()
        };
        let result = commands.run("true", opts).await.unwrap();
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_kill_maps_not_found_to_false() {
        let mut transport = MockProcessTransport::new();
        transport
            .expect_send_signal()
            .with(mockall::predicate::always(), eq(1u32), eq(Signal::Kill))
            .returning(|_, _, _| Ok(()));
        transport
            .expect_send_signal()
            .with(mockall::predicate::always(), eq(2u32), eq(Signal::Kill))
            .returning(|_, _, _| Err(Status::not_found("process with pid 2 not found")));
        transport
            .expect_send_signal()
            .with(mockall::predicate::always(), eq(3u32), eq(Signal::Kill))
            .returning(|_, _, _| Err(Status::unauthenticated("bad user")));

        let commands = commands(transport, None);
        assert!(commands.kill(1).await.unwrap());
        assert!(!commands.kill(2).await.unwrap());
        assert!(matches!(
            commands.kill(3).await,
            Err(Error::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_send_input_unknown_pid_is_not_found() {
        let mut transport = MockProcessTransport::new();
        transport
            .expect_send_input()
            .returning(|_, _, _| Err(Status::not_found("no such process")));

        let commands = commands(transport, None);
        let err = commands.send_stdin(99, "ping\n").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unary_call_bounded_by_request_timeout() {
        let mut transport = MockProcessTransport::new();
        transport.expect_update().returning(|_, _, _| Ok(()));

        let config = ConnectionConfig::resolve(
            ConnectionOptions {
                request_timeout: Some(Duration::from_millis(20)),
                ..Default::default()
            },
            |_| None,
        );
        let commands = Commands::new(Arc::new(transport), Arc::new(config), None);

        commands
            .resize(5, PtySize { cols: 100, rows: 24 })
            .await
            .unwrap();

        let err = commands
            .bounded(None, futures::future::pending::<std::result::Result<(), Status>>())
            .await
            .unwrap_err();
        assert_eq!(err.timeout_kind(), Some(TimeoutKind::Request));
    }

    #[tokio::test]
    async fn test_connect_accepts_data_first() {
        let mut transport = MockProcessTransport::new();
        transport
            .expect_connect()
            .with(mockall::predicate::always(), eq(8u32))
            .returning(|_, _| {
                Ok(events(vec![
                    stdout("tail"),
                    Ok(ProcessEvent::End {
                        exit_code: 3,
                        error: None,
                    }),
                ]))
            });

        let commands = commands(transport, None);
        let handle = commands.connect(8, ConnectOptions::default()).await.unwrap();
        assert_eq!(handle.pid(), 8);

        let err = handle.wait().await.unwrap_err();
        let result = err.command_result().unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "tail");
    }

    #[tokio::test]
    async fn test_zero_timeout_is_unbounded() {
        let mut transport = MockProcessTransport::new();
        transport
            .expect_start()
            .withf(|ctx, _| ctx.timeout.is_none())
            .returning(|_, _| {
                Ok(events(vec![
                    Ok(ProcessEvent::Start { pid: 1 }),
                    Ok(ProcessEvent::End {
                        exit_code: 0,
                        error: None,
                    }),
                ]))
            });

        let commands = commands(transport, None);
        let opts = CommandOptions {
            timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        commands.run("true", opts).await.unwrap();
    }
}

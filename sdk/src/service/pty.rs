//! PTY service

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tracing::info;

use crate::domain::types::{ProcessInput, PtySize, StartSpec};
use crate::error::Result;
use crate::service::commands::{lifetime, Commands};
use crate::service::handle::{Callbacks, CommandHandle, PtyCallback};

/// Options for creating an interactive terminal
#[derive(Default)]
pub struct PtyOptions {
    pub user: Option<String>,
    pub cwd: Option<String>,
    /// Extra environment; `TERM` is always overridden
    pub envs: HashMap<String, String>,
    /// Lifetime bound enforced by envd (default 60s, zero disables)
    pub timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    /// Raw terminal output
    pub on_data: Option<PtyCallback>,
}

impl PtyOptions {
    pub fn on_data(mut self, callback: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.on_data = Some(Box::new(callback));
        self
    }
}

/// Interactive terminals backed by the command service
#[derive(Clone)]
pub struct Pty {
    commands: Commands,
}

impl Pty {
    /// Create a new PTY service
    pub fn new(commands: Commands) -> Self {
        Self { commands }
    }

    /// Start an interactive login shell attached to a terminal of `size`
    pub async fn create(&self, size: PtySize, opts: PtyOptions) -> Result<CommandHandle> {
        let mut envs = opts.envs;
        envs.insert("TERM".to_string(), "xterm-256color".to_string());
        envs.entry("LANG".to_string())
            .or_insert_with(|| "C.UTF-8".to_string());
        envs.entry("LC_ALL".to_string())
            .or_insert_with(|| "C.UTF-8".to_string());

        let ctx = self
            .commands
            .context(opts.user.as_deref(), Some(lifetime(opts.timeout)))?;
        let spec = StartSpec {
            cmd: "/bin/bash".to_string(),
            args: vec!["-i".to_string(), "-l".to_string()],
            envs,
            cwd: opts.cwd,
            tag: None,
            pty: Some(size),
            stdin: None,
        };

        info!("Creating PTY ({}x{})", size.cols, size.rows);

        let (pid, events) = self
            .commands
            .open_started(ctx, spec, opts.request_timeout)
            .await?;

        info!("PTY started with pid {}", pid);

        Ok(CommandHandle::spawn(
            pid,
            events,
            self.commands.clone(),
            Callbacks {
                on_pty: opts.on_data,
                ..Default::default()
            },
        ))
    }

    /// Attach to a running terminal
    pub async fn connect(&self, pid: u32, on_data: Option<PtyCallback>) -> Result<CommandHandle> {
        let events = self.commands.open_connected(pid, None, None).await?;
        Ok(CommandHandle::spawn(
            pid,
            events,
            self.commands.clone(),
            Callbacks {
                on_pty: on_data,
                ..Default::default()
            },
        ))
    }

    /// Write raw bytes to the terminal
    pub async fn send_input(&self, pid: u32, data: impl Into<Bytes>) -> Result<()> {
        self.commands
            .send_input(pid, ProcessInput::Pty(data.into()))
            .await
    }

    pub async fn resize(&self, pid: u32, size: PtySize) -> Result<()> {
        self.commands.resize(pid, size).await
    }

    pub async fn kill(&self, pid: u32) -> Result<bool> {
        self.commands.kill(pid).await
    }
}

//! Common domain types

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Outcome of a command that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    /// Error reported by envd alongside the exit, if any
    pub error: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

/// A process known to envd
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub pid: u32,
    pub tag: Option<String>,
    pub cmd: String,
    pub args: Vec<String>,
    pub envs: HashMap<String, String>,
    pub cwd: Option<String>,
}

/// Terminal dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtySize {
    pub cols: u32,
    pub rows: u32,
}

impl Default for PtySize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Output chunk carried by a data event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutput {
    Stdout(Bytes),
    Stderr(Bytes),
    Pty(Bytes),
}

/// Events streamed for one process, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Start { pid: u32 },
    Data(ProcessOutput),
    End { exit_code: i32, error: Option<String> },
    Keepalive,
}

impl ProcessEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessEvent::Start { .. } => "start",
            ProcessEvent::Data(ProcessOutput::Stdout(_)) => "data.stdout",
            ProcessEvent::Data(ProcessOutput::Stderr(_)) => "data.stderr",
            ProcessEvent::Data(ProcessOutput::Pty(_)) => "data.pty",
            ProcessEvent::End { .. } => "end",
            ProcessEvent::Keepalive => "keepalive",
        }
    }
}

/// Input delivered to a running process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessInput {
    Stdin(Bytes),
    Pty(Bytes),
}

/// Signals envd can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

/// Everything envd needs to spawn a process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartSpec {
    pub cmd: String,
    pub args: Vec<String>,
    pub envs: HashMap<String, String>,
    pub cwd: Option<String>,
    pub tag: Option<String>,
    /// Terminal size; `Some` turns the process into a PTY session
    pub pty: Option<PtySize>,
    /// `None` leaves the envd default (stdin kept open)
    pub stdin: Option<bool>,
}

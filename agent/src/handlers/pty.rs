//! PTY handler

use std::io::{Read, Write};
use std::sync::Mutex;

use bytes::Bytes;
use envd_sdk::{ProcessEvent, ProcessOutput, PtySize, StartSpec};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize as NativeSize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

const READ_CHUNK: usize = 4096;

/// Controlling side of a terminal
pub struct PtyTerminal {
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl PtyTerminal {
    /// Write raw bytes as if typed
    pub fn write(&self, data: &[u8]) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("terminal writer lock poisoned"))?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    pub fn resize(&self, size: PtySize) -> anyhow::Result<()> {
        let master = self
            .master
            .lock()
            .map_err(|_| anyhow::anyhow!("terminal lock poisoned"))?;
        master.resize(native_size(size)?)?;
        Ok(())
    }
}

/// A process running on a terminal, with its output reader running
pub struct PtyProcess {
    pub pid: u32,
    pub terminal: PtyTerminal,
    pub child: Box<dyn Child + Send + Sync>,
    pub reader: JoinHandle<()>,
}

fn native_size(size: PtySize) -> anyhow::Result<NativeSize> {
    Ok(NativeSize {
        rows: u16::try_from(size.rows)?,
        cols: u16::try_from(size.cols)?,
        pixel_width: 0,
        pixel_height: 0,
    })
}

/// Spawn `spec` on a new terminal of `size`, publishing its output to `events`
pub fn spawn_pty(
    spec: &StartSpec,
    size: PtySize,
    events: broadcast::Sender<ProcessEvent>,
) -> anyhow::Result<PtyProcess> {
    let pair = native_pty_system().openpty(native_size(size)?)?;

    let mut cmd = CommandBuilder::new(&spec.cmd);
    cmd.args(&spec.args);
    for (key, value) in &spec.envs {
        cmd.env(key, value);
    }
    if let Some(cwd) = &spec.cwd {
        cmd.cwd(cwd);
    }

    let child = pair.slave.spawn_command(cmd)?;
    // The reader only sees EOF once no slave handle is left open here
    drop(pair.slave);

    let pid = child
        .process_id()
        .ok_or_else(|| anyhow::anyhow!("spawned terminal process has no pid"))?;

    let mut reader = pair.master.try_clone_reader()?;
    let writer = pair.master.take_writer()?;

    let reader = tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let _ = events.send(ProcessEvent::Data(ProcessOutput::Pty(
                        Bytes::copy_from_slice(&buf[..n]),
                    )));
                }
                // EIO once the terminal's last process exits
                Err(e) => {
                    debug!("Terminal reader stopped: {}", e);
                    break;
                }
            }
        }
    });

    Ok(PtyProcess {
        pid,
        terminal: PtyTerminal {
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
        },
        child,
        reader,
    })
}

/// Terminal event for a terminal process exit
pub fn exit_event(status: std::io::Result<portable_pty::ExitStatus>) -> ProcessEvent {
    match status {
        Ok(status) => ProcessEvent::End {
            exit_code: i32::try_from(status.exit_code()).unwrap_or(-1),
            error: None,
        },
        Err(e) => ProcessEvent::End {
            exit_code: -1,
            error: Some(e.to_string()),
        },
    }
}

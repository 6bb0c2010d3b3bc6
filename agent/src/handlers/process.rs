//! Piped process handler

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::Bytes;
use envd_sdk::{ProcessEvent, ProcessOutput, Signal, StartSpec};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const READ_CHUNK: usize = 8192;

/// A spawned process with its output pumps running
pub struct PipedProcess {
    pub pid: u32,
    pub child: Child,
    pub stdin: Option<ChildStdin>,
    pub pumps: Vec<JoinHandle<()>>,
}

/// Spawn `spec` on pipes, publishing its output to `events`.
///
/// The child leads its own process group so signals reach everything it forks.
pub fn spawn_piped(
    spec: &StartSpec,
    events: broadcast::Sender<ProcessEvent>,
) -> anyhow::Result<PipedProcess> {
    let mut cmd = Command::new(&spec.cmd);
    cmd.args(&spec.args)
        .envs(spec.envs.iter())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(false);

    if spec.stdin == Some(false) {
        cmd.stdin(Stdio::null());
    } else {
        cmd.stdin(Stdio::piped());
    }

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = cmd.spawn()?;
    let pid = child
        .id()
        .ok_or_else(|| anyhow::anyhow!("spawned process has no pid"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("stderr not captured"))?;
    let stdin = child.stdin.take();

    let pumps = vec![
        pump(stdout, events.clone(), ProcessOutput::Stdout),
        pump(stderr, events, ProcessOutput::Stderr),
    ];

    Ok(PipedProcess {
        pid,
        child,
        stdin,
        pumps,
    })
}

/// Forward raw chunks from `reader` until EOF
fn pump<R>(
    mut reader: R,
    events: broadcast::Sender<ProcessEvent>,
    wrap: fn(Bytes) -> ProcessOutput,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    // No observers is fine; output is not replayed
                    let chunk = Bytes::copy_from_slice(&buf[..n]);
                    let _ = events.send(ProcessEvent::Data(wrap(chunk)));
                }
                Err(e) => {
                    warn!("Failed to read process output: {}", e);
                    break;
                }
            }
        }
    })
}

/// Wait for output pumps, giving up after `timeout`
pub async fn drain(pumps: Vec<JoinHandle<()>>, timeout: Duration) {
    for pump in pumps {
        let abort = pump.abort_handle();
        if tokio::time::timeout(timeout, pump).await.is_err() {
            debug!("Output still open after exit, abandoning it");
            abort.abort();
        }
    }
}

/// Terminal event for an exit status
pub fn exit_event(status: ExitStatus) -> ProcessEvent {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => ProcessEvent::End {
            exit_code: code,
            error: None,
        },
        (None, Some(signal)) => ProcessEvent::End {
            exit_code: -1,
            error: Some(format!("signal: {}", signal_name(signal))),
        },
        (None, None) => ProcessEvent::End {
            exit_code: -1,
            error: Some(status.to_string()),
        },
    }
}

fn signal_name(signal: i32) -> String {
    nix::sys::signal::Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| signal.to_string())
}

/// Signal the process group led by `pid`
pub fn kill_process(pid: u32, signal: Signal) -> anyhow::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal as NixSignal};
    use nix::unistd::Pid;

    let signal = match signal {
        Signal::Term => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };

    let pid = i32::try_from(pid)?;
    match killpg(Pid::from_raw(pid), signal) {
        // Already gone; the exit is reported on the stream
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

//! gRPC transport to envd

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tracing::debug;

use crate::config::ENVD_PORT;
use crate::domain::types::{
    ProcessDescriptor, ProcessEvent, ProcessInput, ProcessOutput, PtySize, Signal, StartSpec,
};
use crate::error::Result;
use crate::infra::transport::{CallContext, EventStream, ProcessTransport};
use crate::proto::process_client::ProcessClient;
use crate::proto::{self, process_event, process_input, process_selector};

/// HTTP/2 keepalive interval; keeps idle streams alive through the edge proxy
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(50);

/// envd process service reached over gRPC
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    client: ProcessClient<Channel>,
    sandbox_id: String,
}

impl GrpcTransport {
    /// Create a transport for the envd at `envd_url`.
    ///
    /// The channel connects lazily on first use.
    pub fn new(envd_url: &str, sandbox_id: &str) -> Result<Self> {
        let mut endpoint = Endpoint::from_shared(envd_url.to_string())?
            .http2_keep_alive_interval(KEEPALIVE_INTERVAL)
            .keep_alive_while_idle(true);

        if envd_url.starts_with("https://") {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
        }

        debug!("Created envd channel for sandbox {} at {}", sandbox_id, envd_url);

        Ok(Self::from_channel(endpoint.connect_lazy(), sandbox_id))
    }

    /// Wrap an existing channel
    pub fn from_channel(channel: Channel, sandbox_id: &str) -> Self {
        Self {
            client: ProcessClient::new(channel),
            sandbox_id: sandbox_id.to_string(),
        }
    }

    fn request<T>(&self, ctx: CallContext, message: T) -> Request<T> {
        let mut request = Request::new(message);
        *request.metadata_mut() = ctx.metadata;

        // Routing hints for the edge proxy
        if let Ok(value) = AsciiMetadataValue::try_from(self.sandbox_id.as_str()) {
            request.metadata_mut().insert("e2b-sandbox-id", value);
        }
        request
            .metadata_mut()
            .insert("e2b-sandbox-port", AsciiMetadataValue::from(ENVD_PORT));

        if let Some(timeout) = ctx.timeout {
            request.set_timeout(timeout);
        }
        request
    }
}

fn selector(pid: u32) -> Option<proto::ProcessSelector> {
    Some(proto::ProcessSelector {
        selector: Some(process_selector::Selector::Pid(pid)),
    })
}

fn pty_message(size: PtySize) -> proto::Pty {
    proto::Pty {
        size: Some(proto::pty::Size {
            cols: size.cols,
            rows: size.rows,
        }),
    }
}

/// Convert a wire event into the domain event
fn convert_event(event: Option<proto::ProcessEvent>) -> std::result::Result<ProcessEvent, Status> {
    use process_event::data_event::Output;
    use process_event::Event;

    let event = event
        .and_then(|e| e.event)
        .ok_or_else(|| Status::internal("malformed process event: no event case set"))?;

    let converted = match event {
        Event::Start(start) => ProcessEvent::Start { pid: start.pid },
        Event::Data(data) => match data.output {
            Some(Output::Stdout(bytes)) => {
                ProcessEvent::Data(ProcessOutput::Stdout(Bytes::from(bytes)))
            }
            Some(Output::Stderr(bytes)) => {
                ProcessEvent::Data(ProcessOutput::Stderr(Bytes::from(bytes)))
            }
            Some(Output::Pty(bytes)) => ProcessEvent::Data(ProcessOutput::Pty(Bytes::from(bytes))),
            None => return Err(Status::internal("malformed data event: no output case set")),
        },
        Event::End(end) => ProcessEvent::End {
            exit_code: end.exit_code,
            error: end.error.filter(|e| !e.is_empty()),
        },
        Event::Keepalive(_) => ProcessEvent::Keepalive,
    };
    Ok(converted)
}

fn convert_info(info: proto::ProcessInfo) -> ProcessDescriptor {
    let config = info.config.unwrap_or_default();
    ProcessDescriptor {
        pid: info.pid,
        tag: info.tag,
        cmd: config.cmd,
        args: config.args,
        envs: config.envs,
        cwd: config.cwd,
    }
}

#[async_trait]
impl ProcessTransport for GrpcTransport {
    async fn list(&self, ctx: CallContext) -> std::result::Result<Vec<ProcessDescriptor>, Status> {
        let request = self.request(ctx, proto::ListRequest {});
        let response = self.client.clone().list(request).await?.into_inner();
        Ok(response.processes.into_iter().map(convert_info).collect())
    }

    async fn start(
        &self,
        ctx: CallContext,
        spec: StartSpec,
    ) -> std::result::Result<EventStream, Status> {
        let message = proto::StartRequest {
            process: Some(proto::ProcessConfig {
                cmd: spec.cmd,
                args: spec.args,
                envs: spec.envs,
                cwd: spec.cwd,
            }),
            pty: spec.pty.map(pty_message),
            tag: spec.tag,
            stdin: spec.stdin,
        };
        let request = self.request(ctx, message);
        let stream = self.client.clone().start(request).await?.into_inner();
        Ok(Box::pin(
            stream.map(|item| item.and_then(|response| convert_event(response.event))),
        ))
    }

    async fn connect(
        &self,
        ctx: CallContext,
        pid: u32,
    ) -> std::result::Result<EventStream, Status> {
        let request = self.request(
            ctx,
            proto::ConnectRequest {
                process: selector(pid),
            },
        );
        let stream = self.client.clone().connect(request).await?.into_inner();
        Ok(Box::pin(
            stream.map(|item| item.and_then(|response| convert_event(response.event))),
        ))
    }

    async fn send_input(
        &self,
        ctx: CallContext,
        pid: u32,
        input: ProcessInput,
    ) -> std::result::Result<(), Status> {
        let input = match input {
            ProcessInput::Stdin(data) => process_input::Input::Stdin(data.to_vec()),
            ProcessInput::Pty(data) => process_input::Input::Pty(data.to_vec()),
        };
        let request = self.request(
            ctx,
            proto::SendInputRequest {
                process: selector(pid),
                input: Some(proto::ProcessInput { input: Some(input) }),
            },
        );
        self.client.clone().send_input(request).await?;
        Ok(())
    }

    async fn send_signal(
        &self,
        ctx: CallContext,
        pid: u32,
        signal: Signal,
    ) -> std::result::Result<(), Status> {
        let signal = match signal {
            Signal::Term => proto::Signal::Sigterm,
            Signal::Kill => proto::Signal::Sigkill,
        };
        let request = self.request(
            ctx,
            proto::SendSignalRequest {
                process: selector(pid),
                signal: signal as i32,
            },
        );
        self.client.clone().send_signal(request).await?;
        Ok(())
    }

    async fn update(
        &self,
        ctx: CallContext,
        pid: u32,
        size: PtySize,
    ) -> std::result::Result<(), Status> {
        let request = self.request(
            ctx,
            proto::UpdateRequest {
                process: selector(pid),
                pty: Some(pty_message(size)),
            },
        );
        self.client.clone().update(request).await?;
        Ok(())
    }
}

//! Client facade

use std::sync::Arc;

use semver::Version;
use tracing::info;

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::infra::grpc::GrpcTransport;
use crate::infra::transport::ProcessTransport;
use crate::service::commands::Commands;
use crate::service::pty::Pty;

/// Entry point bundling the command and PTY services of one sandbox
#[derive(Clone)]
pub struct EnvdClient {
    commands: Commands,
    pty: Pty,
}

impl EnvdClient {
    /// Connect to the envd of `sandbox_id` over gRPC.
    ///
    /// `envd_version` is the version reported for the sandbox, if known; it
    /// gates features older envd builds lack.
    pub fn connect(
        sandbox_id: &str,
        envd_version: Option<&str>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let envd_version = envd_version.map(Version::parse).transpose()?;
        let url = config.envd_url(sandbox_id);

        info!("Connecting to envd of sandbox {} at {}", sandbox_id, url);

        let transport = GrpcTransport::new(&url, sandbox_id)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config,
            envd_version,
        ))
    }

    /// Build a client over any transport
    pub fn with_transport(
        transport: Arc<dyn ProcessTransport>,
        config: ConnectionConfig,
        envd_version: Option<Version>,
    ) -> Self {
        let commands = Commands::new(transport, Arc::new(config), envd_version);
        let pty = Pty::new(commands.clone());
        Self { commands, pty }
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub fn pty(&self) -> &Pty {
        &self.pty
    }
}

impl std::fmt::Debug for EnvdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvdClient")
            .field("domain", &self.commands.config().domain())
            .field(
                "envd_version",
                &self.commands.envd_version().map(ToString::to_string),
            )
            .finish_non_exhaustive()
    }
}

//! envd SDK
//!
//! Runs commands inside a remote sandbox through its envd process service.
//! Each started or attached process is represented by a [`CommandHandle`]
//! that streams output as it arrives and resolves to a [`CommandResult`].
//!
//! ```no_run
//! use envd_sdk::{CommandOptions, ConnectionConfig, EnvdClient};
//!
//! # async fn demo() -> envd_sdk::Result<()> {
//! let client = EnvdClient::connect("sandbox-id", None, ConnectionConfig::from_env())?;
//! let result = client.commands().run("echo hello", CommandOptions::default()).await?;
//! assert_eq!(result.stdout, "hello\n");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod proto;
pub mod service;

pub use client::EnvdClient;
pub use config::{ConnectionConfig, ConnectionOptions, Deadline};
pub use domain::types::{
    CommandResult, ProcessDescriptor, ProcessEvent, ProcessInput, ProcessOutput, PtySize, Signal,
    StartSpec,
};
pub use error::{Error, Result, TimeoutKind};
pub use infra::grpc::GrpcTransport;
pub use infra::transport::{CallContext, EventStream, ProcessTransport};
pub use service::commands::{CommandOptions, Commands, ConnectOptions};
pub use service::handle::{CommandHandle, HandleState, OutputCallback, PtyCallback};
pub use service::pty::{Pty, PtyOptions};

//! Transport seam between the services and envd
//!
//! Implementations deliver events of one stream in order and report faults as
//! raw [`tonic::Status`] values; translation into [`crate::Error`] happens in
//! the services.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use tonic::metadata::MetadataMap;
use tonic::Status;

use crate::domain::types::{
    ProcessDescriptor, ProcessEvent, ProcessInput, PtySize, Signal, StartSpec,
};

/// Ordered events of one start/connect stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ProcessEvent, Status>> + Send>>;

/// Per-call context handed to the transport
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Identity and extra headers
    pub metadata: MetadataMap,
    /// Lifetime bound for streams, enforced by envd; `None` is unbounded
    pub timeout: Option<Duration>,
}

/// The envd process RPC surface
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessTransport: Send + Sync + 'static {
    async fn list(&self, ctx: CallContext) -> Result<Vec<ProcessDescriptor>, Status>;

    async fn start(&self, ctx: CallContext, spec: StartSpec) -> Result<EventStream, Status>;

    async fn connect(&self, ctx: CallContext, pid: u32) -> Result<EventStream, Status>;

    async fn send_input(
        &self,
        ctx: CallContext,
        pid: u32,
        input: ProcessInput,
    ) -> Result<(), Status>;

    async fn send_signal(&self, ctx: CallContext, pid: u32, signal: Signal) -> Result<(), Status>;

    async fn update(&self, ctx: CallContext, pid: u32, size: PtySize) -> Result<(), Status>;
}

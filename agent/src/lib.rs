//! Loopback envd
//!
//! Serves the envd process surface in-process by running real local
//! processes, either on plain pipes or on a pseudo-terminal. Plug it into
//! [`envd_sdk::EnvdClient::with_transport`] to exercise the SDK without a
//! remote sandbox.

pub mod config;
mod handlers;
pub mod runtime;

pub use config::LoopbackConfig;
pub use runtime::LoopbackEnvd;

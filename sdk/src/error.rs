//! Error types for the envd client
//!
//! Transport faults arrive as [`tonic::Status`] and are translated exactly once,
//! in [`Error::from_status`]. Everything above the transport only deals with
//! [`Error`].

use std::fmt;

use thiserror::Error;
use tonic::{Code, Status};

use crate::domain::types::CommandResult;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which deadline fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// The client gave up waiting for the call or stream to start responding
    Request,
    /// envd ended the stream because the command outlived its lifetime bound
    Execution,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Request => f.write_str("request"),
            TimeoutKind::Execution => f.write_str("execution"),
        }
    }
}

/// Main error type for the envd client
#[derive(Debug, Clone, Error)]
pub enum Error {
    // Request errors (1000-1999)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Unsupported: {feature} requires envd {required} or newer, sandbox runs {actual}")]
    Unsupported {
        feature: &'static str,
        required: semver::Version,
        actual: semver::Version,
    },

    // Lookup errors (2000-2999)
    #[error("Not found: {0}")]
    NotFound(String),

    // Timeout errors (4000-4099)
    #[error("{message}")]
    Timeout { kind: TimeoutKind, message: String },

    // Command errors (4100-4199)
    #[error("Command exited with code {}{}", .0.exit_code, error_suffix(.0))]
    CommandExit(CommandResult),

    // Sandbox errors (5000-5999)
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

fn error_suffix(result: &CommandResult) -> String {
    match result.error.as_deref() {
        Some(err) if !err.is_empty() => format!(" and error: {}", err),
        _ => String::new(),
    }
}

impl Error {
    /// Translate a transport status into the domain taxonomy.
    ///
    /// The mapping is total: codes without a dedicated member become
    /// [`Error::Sandbox`] carrying the code and message.
    pub fn from_status(status: &Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::InvalidArgument => Error::InvalidArgument(message),
            Code::Unauthenticated | Code::PermissionDenied => Error::Authentication(message),
            Code::NotFound => Error::NotFound(message),
            Code::Cancelled => Error::request_timeout(),
            Code::DeadlineExceeded => Error::execution_timeout(),
            Code::Unavailable => Error::Sandbox(format!(
                "sandbox is unavailable, it was probably killed or timed out: {}",
                message
            )),
            code => Error::Sandbox(format!("{:?}: {}", code, message)),
        }
    }

    /// Timeout raised when the per-request deadline fires on the client
    pub fn request_timeout() -> Self {
        Error::Timeout {
            kind: TimeoutKind::Request,
            message: "Request timed out before envd responded. \
                      Raise `request_timeout` on the call or in ConnectionConfig."
                .to_string(),
        }
    }

    /// Timeout raised when envd cancels a stream that outlived its lifetime bound
    pub fn execution_timeout() -> Self {
        Error::Timeout {
            kind: TimeoutKind::Execution,
            message: "Command execution timed out on the sandbox. \
                      Raise `timeout` when starting the command, or pass zero to disable it."
                .to_string(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidArgument(_) => 1001,
            Error::Authentication(_) => 1002,
            Error::Unsupported { .. } => 1003,

            Error::NotFound(_) => 2001,

            Error::Timeout {
                kind: TimeoutKind::Request,
                ..
            } => 4001,
            Error::Timeout {
                kind: TimeoutKind::Execution,
                ..
            } => 4002,

            Error::CommandExit(_) => 4101,

            Error::Sandbox(_) => 5001,
            Error::Protocol(_) => 5002,
        }
    }

    /// The captured result of a command that exited with a nonzero code
    pub fn command_result(&self) -> Option<&CommandResult> {
        match self {
            Error::CommandExit(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn timeout_kind(&self) -> Option<TimeoutKind> {
        match self {
            Error::Timeout { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::from_status(&status)
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Error::Sandbox(format!("transport error: {}", err))
    }
}

impl From<semver::Error> for Error {
    fn from(err: semver::Error) -> Self {
        Error::InvalidArgument(format!("invalid envd version: {}", err))
    }
}

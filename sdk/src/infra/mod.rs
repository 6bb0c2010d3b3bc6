//! Infrastructure layer

pub mod grpc;
pub mod transport;

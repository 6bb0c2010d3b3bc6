//! Domain types shared by the services and the transport

pub mod capability;
pub mod types;

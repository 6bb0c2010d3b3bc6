//! Service layer

pub mod commands;
pub mod handle;
pub mod pty;

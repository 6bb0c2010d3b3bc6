//! Process handlers

pub mod process;
pub mod pty;

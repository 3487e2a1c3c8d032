//! rexec: Command-line interface for the remote execution client
//!
//! Provides the `rexec` CLI for logging in, deploying executables, and
//! running them on the backend.

pub mod client;
pub mod commands;
pub mod output;

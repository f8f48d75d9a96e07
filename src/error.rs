//! Error types for session establishment and command execution.
//!
//! All variants are resolved inside the crate: the public [`crate::Session`]
//! API converts them into failure booleans, empty output, or `unknown`
//! records at the session boundary. Internal functions propagate them
//! with `?`.

use thiserror::Error;
use tokio::sync::mpsc::error::SendError;

/// Errors that can occur while establishing a session or running a command.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The transport could not be established.
    ///
    /// Covers TCP connect failures, SSH handshake/authentication failures
    /// across every fallback strategy, and Telnet connect timeouts. The
    /// message carries the last underlying cause.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// An error occurred in the async-ssh2-tokio library.
    #[error("async ssh2 error: {0}")]
    Ssh2(#[from] async_ssh2_tokio::Error),

    /// An error occurred in the russh library.
    #[error("russh error: {0}")]
    Russh(#[from] russh::Error),

    /// A socket-level I/O error from the Telnet transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to hand data to the transport I/O task.
    #[error("failed to send data: {0}")]
    SendData(#[from] SendError<String>),
}

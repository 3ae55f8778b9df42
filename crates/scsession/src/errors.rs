//! Error types for the wire protocol and session layer.

use thiserror::Error;

/// Errors that can occur sending/receiving OSC messages or driving a
/// session's lifecycle.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("OSC encode/decode error: {0}")]
    Osc(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server is not running (current state: {0:?})")]
    NotRunning(crate::session::SessionState),

    #[error("server is already running or booting (current state: {0:?})")]
    AlreadyRunning(crate::session::SessionState),

    #[error("timed out waiting for a reply to {0}")]
    ReplyTimeout(String),

    #[error("server replied /fail to {command}: {reason}")]
    ServerFail { command: String, reason: String },

    #[error("engine shim error: {0}")]
    Engine(String),

    #[error("graph error: {0}")]
    Graph(#[from] scgraph::GraphError),

    #[error("node id pool exhausted")]
    NodeIdPoolExhausted,

    #[error("buffer id pool exhausted")]
    BufferIdPoolExhausted,
}

pub type Result<T> = std::result::Result<T, SessionError>;

//! Errors surfaced by the transport collaborator boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("connection reset")]
    ConnectionReset,
    #[error("i/o error: {0}")]
    Io(String),
    #[error("transport shut down")]
    ShutDown,
    #[error("bad configuration: {0}")]
    BadConfig(String),
}

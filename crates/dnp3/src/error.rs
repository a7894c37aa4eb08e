//! Crate-wide error type. Protocol-layer errors (checksum failures, bad
//! sequence numbers, ...) never reach this type — they are handled locally
//! by the layer that detected them: a counter bump and a dropped
//! frame. `Error` carries only failures a public API call can return.

use thiserror::Error as ThisError;

use crate::app::AppError;
use crate::channel::ChannelManagerError;
use crate::link::LinkError;
use crate::master::tasks::FileTaskError;
use dnp3_objects::ObjectError;
use dnp3_transport::TransportError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("link layer error: {0}")]
    Link(#[from] LinkError),

    #[error("application layer error: {0}")]
    App(#[from] AppError),

    #[error("object codec error: {0}")]
    Object(#[from] ObjectError),

    #[error("file transfer error: {0}")]
    File(#[from] FileTaskError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("channel manager error: {0}")]
    Channel(#[from] ChannelManagerError),

    #[error("the stack has been shut down")]
    Shutdown,

    #[error("operation timed out")]
    Timeout,
}

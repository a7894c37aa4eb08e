//! Physical transport configuration and the collaborator interfaces a
//! concrete socket driver must implement to plug into a DNP3 channel.
//!
//! Concrete TCP/UDP/Serial/TLS I/O is explicitly out of scope for this
//! crate: it defines only the configuration shapes and the
//! [`IoHandler`] / [`ChannelListener`] contracts that the channel manager
//! drives. A host application supplies the real socket plumbing.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod traits;

pub use config::*;
pub use error::TransportError;
pub use traits::*;

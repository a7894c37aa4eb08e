//! Collaborator interfaces a host application implements to supply the
//! actual socket I/O. The channel manager drives these; it never
//! opens a socket itself.

use crate::TransportError;
use async_trait::async_trait;

/// Observable lifecycle of a physical channel, as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Opening,
    Open,
    Closed,
    Shutdown,
}

/// Notified of channel-level state transitions.
pub trait ChannelListener: Send + Sync {
    fn on_state_change(&self, state: ChannelState);
}

/// A no-op listener, useful as a default when the host application doesn't
/// care to observe channel state.
pub struct NullChannelListener;
impl ChannelListener for NullChannelListener {
    fn on_state_change(&self, _state: ChannelState) {}
}

/// Notified of link-layer events that don't map to a specific session.
pub trait LinkListener: Send + Sync {
    fn on_unknown_destination(&self, destination: u16) {
        let _ = destination;
    }
    fn on_keep_alive_initiated(&self) {}
    fn on_keep_alive_success(&self) {}
    fn on_keep_alive_failure(&self) {}
}

pub struct NullLinkListener;
impl LinkListener for NullLinkListener {
    fn on_unknown_destination(&self, _destination: u16) {}
}

/// The socket/serial/TLS driver contract. A concrete implementation knows
/// how to open, read, write, and close one physical medium; framing,
/// retries, and session routing live above this boundary.
#[async_trait]
pub trait IoHandler: Send + Sync {
    /// Begins (re-)establishing the physical connection. Returns once the
    /// transport is ready to `read`/`write`, or an error describing why it
    /// could not be brought up.
    async fn open(&self) -> Result<(), TransportError>;

    /// Reads at least one byte into `buf`, returning the number read.
    async fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Writes the entirety of `buf`.
    async fn write(&self, buf: &[u8]) -> Result<(), TransportError>;

    /// Tears down the physical connection. Must be safe to call multiple
    /// times and safe to call when not open.
    async fn close(&self);
}

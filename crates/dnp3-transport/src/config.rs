//! Connection configuration shapes: per-medium settings tagged
//! into [`ConnectionOptions`], retry policy, and primary/backup settings.

use std::net::SocketAddr;
use std::time::Duration;

/// Serial line settings. Mirrors `SerialSettings` in the original stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub device_name: String,
    pub baud: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    pub async_open_delay: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            baud: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            async_open_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    None,
    One,
    OnePointFive,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Hardware,
    Software,
}

/// TCP client settings: a list of candidate endpoints tried in order, plus
/// OS-level keep-alive tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpSettings {
    pub endpoints: Vec<SocketAddr>,
    pub force_keep_alive: bool,
    pub keep_idle: Duration,
    pub keep_interval: Duration,
}

impl TcpSettings {
    pub fn single(endpoint: SocketAddr) -> Self {
        Self {
            endpoints: vec![endpoint],
            force_keep_alive: false,
            keep_idle: Duration::ZERO,
            keep_interval: Duration::ZERO,
        }
    }
}

/// A bound local/remote endpoint pair for connectionless UDP sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpSettings {
    pub local: SocketAddr,
    pub remote: SocketAddr,
}

/// Minimal TLS parameters. The TLS library itself is an external
/// collaborator; this only carries the names needed to select
/// certificates and validate peer identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub peer_cert_path: String,
    pub local_cert_path: String,
    pub private_key_path: String,
    pub dns_name: Option<String>,
}

/// Tagged sum over the physical media a channel may be configured for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSettings {
    Serial(SerialSettings),
    Tcp(TcpSettings),
    Udp(UdpSettings),
    Tls(TcpSettings, TlsConfig),
}

/// Full configuration for one physical channel (primary or backup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub name: String,
    pub enabled: bool,
    pub settings: ConnectionSettings,
    pub is_backup_channel: bool,
    pub readings_before_return_to_primary: u32,
}

impl ConnectionOptions {
    pub fn new(name: impl Into<String>, settings: ConnectionSettings) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            settings,
            is_backup_channel: false,
            readings_before_return_to_primary: 0,
        }
    }

    pub fn as_backup(mut self, readings_before_return_to_primary: u32) -> Self {
        self.is_backup_channel = true;
        self.readings_before_return_to_primary = readings_before_return_to_primary;
        self
    }

    pub fn use_serial(&self) -> bool {
        matches!(self.settings, ConnectionSettings::Serial(_))
    }

    pub fn use_tcp(&self) -> bool {
        matches!(self.settings, ConnectionSettings::Tcp(_) | ConnectionSettings::Tls(_, _))
    }

    pub fn use_udp(&self) -> bool {
        matches!(self.settings, ConnectionSettings::Udp(_))
    }
}

/// Reconnect policy applied by the channel manager on I/O failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRetry {
    pub min_open_retry: Duration,
    pub max_open_retry: Duration,
    pub reconnect_delay: Duration,
    pub infinite_tries: bool,
}

impl ChannelRetry {
    pub fn new(min_open_retry: Duration, max_open_retry: Duration) -> Self {
        Self {
            min_open_retry,
            max_open_retry,
            reconnect_delay: Duration::ZERO,
            infinite_tries: true,
        }
    }

    /// Doubles the previous delay, capped at `max_open_retry`.
    pub fn next_delay(&self, previous: Duration) -> Duration {
        let doubled = previous.saturating_mul(2);
        doubled.min(self.max_open_retry).max(self.min_open_retry)
    }
}

impl Default for ChannelRetry {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

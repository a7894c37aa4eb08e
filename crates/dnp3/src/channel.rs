//! Channel Manager: the session registry and `(source,
//! destination)` router, the per-channel tx queue, and primary/backup
//! channel selection driven by task success history.
//!
//! This module is the pure decision core: it never opens a socket or
//! starts a timer itself. The caller's strand holds a
//! [`ChannelManager`] alongside a concrete [`dnp3_transport::IoHandler`]
//! and turns each [`FailoverDecision`]/[`RouteResult`] into the matching
//! `prepare`/`shutdown`/`on_frame` call.

use std::collections::VecDeque;

use dnp3_dtyp::StatisticsKind;
use dnp3_transport::{ChannelRetry, ConnectionOptions};
use thiserror::Error;

use crate::stats::StatisticsRegistry;

/// Health of one physical channel as tracked for failover purposes:
/// `{Working, Error, Undecided}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkHealth {
    Working,
    Error,
    Undecided,
}

/// Which of the two configured physical channels is presently selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected {
    Primary,
    Backup,
}

/// `(source, destination)` routing address pair a session is registered
/// under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteAddresses {
    pub source: u16,
    pub destination: u16,
}

/// Opaque handle to a registered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u32);

struct SessionRecord {
    id: SessionId,
    addresses: RouteAddresses,
    enabled: bool,
    online: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelManagerError {
    #[error("a session is already registered for source {0:#06x} -> destination {1:#06x}")]
    DuplicateRoute(u16, u16),
    #[error("the channel has been shut down")]
    ShutDown,
}

/// Outcome of routing one received frame by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteResult {
    Delivered(SessionId),
    UnknownDestination,
}

/// What the caller should do after reporting a task's completion or a
/// successful data-reading task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverDecision {
    /// Stay on the currently-selected channel.
    NoChange,
    /// Switch the outgoing physical channel to this one. Tearing down the
    /// channel being left never raises `lower_layer_down` for sessions
    /// — only the new channel's own open/closed transition does.
    SwitchTo(Selected),
    /// Both primary and backup are in `Error` (or no backup is configured
    /// and the primary failed): the caller surfaces `failure_no_comms` to
    /// pending tasks.
    BothDown,
}

/// One entry in the channel's tx queue: the bytes to write and the
/// session that submitted them.
pub struct TxEntry {
    pub session: SessionId,
    pub buffer: Vec<u8>,
}

/// Session registry, router, tx queue, and primary/backup selection for
/// one logical channel. Exclusively owns its session descriptors
/// and its statistics registry.
pub struct ChannelManager {
    primary: ConnectionOptions,
    backup: Option<ConnectionOptions>,
    retry: ChannelRetry,
    selected: Selected,
    primary_health: LinkHealth,
    backup_health: LinkHealth,
    successful_reads_on_backup: u32,
    readings_before_return_to_primary: u32,
    sessions: Vec<SessionRecord>,
    next_session_id: u32,
    tx_queue: VecDeque<TxEntry>,
    stats: StatisticsRegistry,
    num_close: u64,
    shutdown: bool,
    respond_to_any_master: bool,
}

impl ChannelManager {
    pub fn new(primary: ConnectionOptions, backup: Option<ConnectionOptions>, retry: ChannelRetry) -> Self {
        Self::with_master_filter(primary, backup, retry, false)
    }

    /// `respond_to_any_master` relaxes [`Self::route`] to match a frame by
    /// `destination` alone, the way an outstation's `OutstationConfig`
    /// field of the same name is documented: a strict router only
    /// delivers frames whose source matches the exact registered route.
    pub fn with_master_filter(
        primary: ConnectionOptions,
        backup: Option<ConnectionOptions>,
        retry: ChannelRetry,
        respond_to_any_master: bool,
    ) -> Self {
        let readings = backup
            .as_ref()
            .map(|b| b.readings_before_return_to_primary)
            .unwrap_or(0);
        Self {
            primary,
            backup,
            retry,
            selected: Selected::Primary,
            primary_health: LinkHealth::Undecided,
            backup_health: LinkHealth::Undecided,
            successful_reads_on_backup: 0,
            readings_before_return_to_primary: readings,
            sessions: Vec::new(),
            next_session_id: 0,
            tx_queue: VecDeque::new(),
            stats: StatisticsRegistry::new(false),
            num_close: 0,
            shutdown: false,
            respond_to_any_master,
        }
    }

    pub fn stats(&self) -> &StatisticsRegistry {
        &self.stats
    }

    pub fn selected(&self) -> Selected {
        self.selected
    }

    pub fn using_backup(&self) -> bool {
        self.selected == Selected::Backup
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// The `ConnectionOptions` of whichever channel is currently selected.
    pub fn active_connection(&self) -> &ConnectionOptions {
        match self.selected {
            Selected::Primary => &self.primary,
            Selected::Backup => self.backup.as_ref().unwrap_or(&self.primary),
        }
    }

    // --- session registry & routing ---

    /// Registers a new session under `addresses`. Each `(source,
    /// destination)` route is unique per channel.
    pub fn register_session(&mut self, addresses: RouteAddresses) -> Result<SessionId, ChannelManagerError> {
        if self.shutdown {
            return Err(ChannelManagerError::ShutDown);
        }
        if self.sessions.iter().any(|s| s.addresses == addresses) {
            return Err(ChannelManagerError::DuplicateRoute(addresses.source, addresses.destination));
        }
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        self.sessions.push(SessionRecord {
            id,
            addresses,
            enabled: true,
            online: false,
        });
        Ok(id)
    }

    /// Enabling an already-enabled (or disabling an already-disabled)
    /// session is a no-op ("enabling/disabling is
    /// idempotent"). Once this returns with
    /// `enabled=false` no further routed frame reaches the session.
    pub fn set_enabled(&mut self, id: SessionId, enabled: bool) {
        if let Some(record) = self.sessions.iter_mut().find(|s| s.id == id) {
            record.enabled = enabled;
        }
    }

    pub fn is_online(&self, id: SessionId) -> bool {
        self.sessions.iter().any(|s| s.id == id && s.online)
    }

    /// Marks every registered session online/offline, e.g. on channel
    /// open/teardown (`online=false` whenever the channel is
    /// down).
    fn set_all_online(&mut self, online: bool) {
        for s in &mut self.sessions {
            s.online = online;
        }
    }

    /// Routes a received frame by its `(source, destination)` addresses.
    /// A frame addressed to a disabled or unregistered route
    /// is an `UnknownDestination`: counted, not delivered.
    pub fn route(&mut self, addresses: RouteAddresses) -> RouteResult {
        let found = self
            .sessions
            .iter()
            .find(|s| {
                s.enabled
                    && (s.addresses == addresses
                        || (self.respond_to_any_master && s.addresses.destination == addresses.destination))
            })
            .map(|s| s.id);
        match found {
            Some(id) => RouteResult::Delivered(id),
            None => {
                log::warn!(
                    "dropping frame for unknown route {}->{}",
                    addresses.source,
                    addresses.destination
                );
                self.stats.increment(StatisticsKind::UnexpectedBytesReceived);
                RouteResult::UnknownDestination
            }
        }
    }

    // --- tx queue ---

    /// Appends a submission to the tx queue. Writes proceed one at a time,
    /// in submission order.
    pub fn enqueue_tx(&mut self, session: SessionId, buffer: Vec<u8>) -> Result<(), ChannelManagerError> {
        if self.shutdown {
            return Err(ChannelManagerError::ShutDown);
        }
        self.tx_queue.push_back(TxEntry { session, buffer });
        Ok(())
    }

    /// The entry currently being transmitted, if any.
    pub fn next_tx(&self) -> Option<&TxEntry> {
        self.tx_queue.front()
    }

    /// Pops the front entry on write completion; the caller notifies that
    /// session's `on_tx_ready()`.
    pub fn complete_tx(&mut self) -> Option<SessionId> {
        self.tx_queue.pop_front().map(|entry| entry.session)
    }

    pub fn tx_queue_len(&self) -> usize {
        self.tx_queue.len()
    }

    fn clear_tx_queue(&mut self) {
        self.tx_queue.clear();
    }

    // --- channel lifecycle & statistics ---

    pub fn on_channel_opened(&mut self) {
        log::info!("{:?} channel opened", self.selected);
        self.stats.increment(StatisticsKind::SucceededConnections);
        self.set_all_online(true);
        match self.selected {
            Selected::Primary => self.primary_health = LinkHealth::Working,
            Selected::Backup => self.backup_health = LinkHealth::Working,
        }
    }

    pub fn on_channel_open_failed(&mut self) {
        log::warn!("{:?} channel failed to open", self.selected);
        self.stats.increment(StatisticsKind::FailedConnections);
        match self.selected {
            Selected::Primary => self.primary_health = LinkHealth::Error,
            Selected::Backup => self.backup_health = LinkHealth::Error,
        }
    }

    pub fn record_frame_sent(&mut self, bytes: usize) {
        self.stats.add(StatisticsKind::BytesSent, bytes as u64);
        self.stats.increment(StatisticsKind::FramesSent);
    }

    pub fn record_frame_received(&mut self, bytes: usize) {
        self.stats.add(StatisticsKind::BytesReceived, bytes as u64);
        self.stats.increment(StatisticsKind::FramesReceived);
    }

    pub fn record_checksum_error(&mut self) {
        self.stats.increment(StatisticsKind::ChecksumErrors);
    }

    pub fn record_frame_format_error(&mut self) {
        self.stats.increment(StatisticsKind::FrameFormatErrors);
    }

    pub fn record_confirmation_sent(&mut self) {
        self.stats.increment(StatisticsKind::ConfirmationsSent);
    }

    pub fn record_confirmation_received(&mut self) {
        self.stats.increment(StatisticsKind::ConfirmationsReceived);
    }

    /// An I/O error on the active channel: the tx queue is cleared,
    /// sessions are marked offline (the
    /// caller notifies them `lower_layer_down`), and the close counter
    /// bumps. Channel rebuild is the caller's concern, subject to
    /// [`ChannelRetry`].
    pub fn reset_on_failure(&mut self) {
        log::warn!("{:?} channel lost, draining {} queued writes", self.selected, self.tx_queue.len());
        self.clear_tx_queue();
        self.set_all_online(false);
        self.num_close += 1;
        self.stats.increment(StatisticsKind::LostConnections);
    }

    pub fn num_close(&self) -> u64 {
        self.num_close
    }

    pub fn retry(&self) -> ChannelRetry {
        self.retry
    }

    /// With `infinite_tries=false`, once both channels are `Error` (or no
    /// backup is configured and the primary is `Error`) the stack gives up
    /// and surfaces `failure_no_comms` to pending tasks.
    pub fn should_surface_no_comms(&self) -> bool {
        !self.retry.infinite_tries
            && self.primary_health == LinkHealth::Error
            && (self.backup.is_none() || self.backup_health == LinkHealth::Error)
    }

    /// `begin_shutdown`: drains the tx queue, marks every session
    /// offline, and makes further public operations no-ops or errors.
    pub fn begin_shutdown(&mut self) {
        log::info!("channel manager shutting down");
        self.shutdown = true;
        self.clear_tx_queue();
        self.set_all_online(false);
    }

    // --- primary/backup selection ---

    /// A task completed (or failed) on the currently-selected channel.
    /// `complete=false` drives the failure path: the current channel is
    /// marked `Error`, selection flips to the other channel, and the
    /// other channel is prepared.
    pub fn on_task_complete(&mut self, complete: bool) -> FailoverDecision {
        if complete {
            return FailoverDecision::NoChange;
        }
        match self.selected {
            Selected::Primary => self.primary_health = LinkHealth::Error,
            Selected::Backup => self.backup_health = LinkHealth::Error,
        }
        self.successful_reads_on_backup = 0;

        if self.backup.is_none() {
            return FailoverDecision::BothDown;
        }

        self.selected = match self.selected {
            Selected::Primary => Selected::Backup,
            Selected::Backup => Selected::Primary,
        };

        if self.primary_health == LinkHealth::Error && self.backup_health == LinkHealth::Error {
            log::error!("both primary and backup channels down, no comms");
            FailoverDecision::BothDown
        } else {
            log::warn!("failing over to {:?} channel", self.selected);
            FailoverDecision::SwitchTo(self.selected)
        }
    }

    /// A data-reading task (e.g. a user poll) succeeded on the backup:
    /// counts toward `readings_before_return_to_primary`,
    /// flipping back to the primary once it is reached.
    pub fn on_data_reading_success(&mut self) -> FailoverDecision {
        if self.selected != Selected::Backup {
            return FailoverDecision::NoChange;
        }
        self.successful_reads_on_backup += 1;
        if self.readings_before_return_to_primary > 0
            && self.successful_reads_on_backup >= self.readings_before_return_to_primary
        {
            self.successful_reads_on_backup = 0;
            self.primary_health = LinkHealth::Undecided;
            self.selected = Selected::Primary;
            FailoverDecision::SwitchTo(Selected::Primary)
        } else {
            FailoverDecision::NoChange
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_transport::{ConnectionSettings, TcpSettings};
    use std::net::SocketAddr;
    use std::time::Duration;

    fn tcp_opts(name: &str, port: u16) -> ConnectionOptions {
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        ConnectionOptions::new(name, ConnectionSettings::Tcp(TcpSettings::single(addr)))
    }

    fn manager(backup: bool) -> ChannelManager {
        let primary = tcp_opts("primary", 20000);
        let backup = backup.then(|| tcp_opts("backup", 20001).as_backup(2));
        ChannelManager::new(primary, backup, ChannelRetry::default())
    }

    #[test]
    fn rejects_duplicate_routes() {
        let mut mgr = manager(false);
        let addr = RouteAddresses { source: 1, destination: 10 };
        mgr.register_session(addr).unwrap();
        assert_eq!(
            mgr.register_session(addr),
            Err(ChannelManagerError::DuplicateRoute(1, 10))
        );
    }

    #[test]
    fn unknown_destination_is_counted_and_dropped() {
        let mut mgr = manager(false);
        mgr.register_session(RouteAddresses { source: 1, destination: 10 }).unwrap();
        let result = mgr.route(RouteAddresses { source: 1, destination: 99 });
        assert_eq!(result, RouteResult::UnknownDestination);
        assert_eq!(mgr.stats().get(StatisticsKind::UnexpectedBytesReceived), 1);
    }

    #[test]
    fn routes_known_destinations() {
        let mut mgr = manager(false);
        let a = mgr.register_session(RouteAddresses { source: 1, destination: 10 }).unwrap();
        let b = mgr.register_session(RouteAddresses { source: 2, destination: 20 }).unwrap();
        assert_eq!(mgr.route(RouteAddresses { source: 1, destination: 10 }), RouteResult::Delivered(a));
        assert_eq!(mgr.route(RouteAddresses { source: 2, destination: 20 }), RouteResult::Delivered(b));
    }

    #[test]
    fn disabling_a_session_is_idempotent_and_removes_it_from_routing() {
        let mut mgr = manager(false);
        let id = mgr.register_session(RouteAddresses { source: 1, destination: 10 }).unwrap();
        mgr.set_enabled(id, false);
        mgr.set_enabled(id, false);
        assert_eq!(
            mgr.route(RouteAddresses { source: 1, destination: 10 }),
            RouteResult::UnknownDestination
        );
    }

    #[test]
    fn tx_queue_is_fifo() {
        let mut mgr = manager(false);
        let a = mgr.register_session(RouteAddresses { source: 1, destination: 10 }).unwrap();
        let b = mgr.register_session(RouteAddresses { source: 2, destination: 20 }).unwrap();
        mgr.enqueue_tx(a, vec![1]).unwrap();
        mgr.enqueue_tx(b, vec![2]).unwrap();
        assert_eq!(mgr.complete_tx(), Some(a));
        assert_eq!(mgr.complete_tx(), Some(b));
        assert_eq!(mgr.complete_tx(), None);
    }

    #[test]
    fn failing_task_flips_to_backup_when_configured() {
        let mut mgr = manager(true);
        assert_eq!(mgr.selected(), Selected::Primary);
        assert_eq!(mgr.on_task_complete(false), FailoverDecision::SwitchTo(Selected::Backup));
        assert!(mgr.using_backup());
    }

    #[test]
    fn both_channels_down_with_no_backup_configured() {
        let mut mgr = manager(false);
        assert_eq!(mgr.on_task_complete(false), FailoverDecision::BothDown);
    }

    #[test]
    fn both_channels_down_when_backup_also_fails() {
        let mut mgr = manager(true);
        assert_eq!(mgr.on_task_complete(false), FailoverDecision::SwitchTo(Selected::Backup));
        assert_eq!(mgr.on_task_complete(false), FailoverDecision::BothDown);
    }

    /// Scenario 6: after `readings_before_return_to_primary` (2)
    /// successful user polls on the backup, the manager flips back to
    /// the primary.
    #[test]
    fn returns_to_primary_after_k_successful_backup_reads() {
        let mut mgr = manager(true);
        mgr.on_task_complete(false);
        assert!(mgr.using_backup());

        assert_eq!(mgr.on_data_reading_success(), FailoverDecision::NoChange);
        assert!(mgr.using_backup());
        assert_eq!(mgr.on_data_reading_success(), FailoverDecision::SwitchTo(Selected::Primary));
        assert!(!mgr.using_backup());
    }

    #[test]
    fn no_comms_surfaces_only_without_infinite_retries() {
        let mut mgr = manager(false);
        mgr.on_task_complete(false);
        assert!(!mgr.should_surface_no_comms());

        let mut retry = ChannelRetry::default();
        retry.infinite_tries = false;
        let mut mgr = ChannelManager::new(tcp_opts("primary", 20000), None, retry);
        mgr.on_task_complete(false);
        assert!(mgr.should_surface_no_comms());
    }

    #[test]
    fn shutdown_drains_tx_queue_and_rejects_further_work() {
        let mut mgr = manager(false);
        let id = mgr.register_session(RouteAddresses { source: 1, destination: 10 }).unwrap();
        mgr.enqueue_tx(id, vec![1, 2, 3]).unwrap();
        mgr.begin_shutdown();
        assert_eq!(mgr.tx_queue_len(), 0);
        assert_eq!(mgr.enqueue_tx(id, vec![4]), Err(ChannelManagerError::ShutDown));
        assert!(!mgr.is_online(id));
    }

    #[test]
    fn reset_on_failure_bumps_lost_connections_and_drains_queue() {
        let mut mgr = manager(false);
        let id = mgr.register_session(RouteAddresses { source: 1, destination: 10 }).unwrap();
        mgr.enqueue_tx(id, vec![1]).unwrap();
        mgr.on_channel_opened();
        assert!(mgr.is_online(id));
        mgr.reset_on_failure();
        assert_eq!(mgr.tx_queue_len(), 0);
        assert!(!mgr.is_online(id));
        assert_eq!(mgr.stats().get(StatisticsKind::LostConnections), 1);
        assert_eq!(mgr.num_close(), 1);
    }
}

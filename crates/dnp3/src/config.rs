//! Master/outstation stack configuration: the field-for-field
//! configuration shapes a host application fills in to build a
//! [`crate::master::MasterSession`] or [`crate::outstation::OutstationEngine`],
//! each with sensible documented defaults.

use std::time::Duration;

use dnp3_objects::{ClassMask, Iin};

use crate::master::scheduler::Retries;
use crate::outstation::FileWorkerConfig;

/// How a command task echoes the qualifier of a control-relay-output or
/// analog-output request back to the outstation on the OPERATE step of a
/// select/operate sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlQualifierMode {
    /// Re-send the exact qualifier/count or range the application supplied
    /// for the SELECT (matches most outstations' expectations).
    #[default]
    SameAsRequest,
    /// Always re-encode as a 2-byte count-and-index-prefix header,
    /// regardless of what the SELECT used.
    TwoByteCount,
}

/// Master stack configuration. Defaults: a 5 second response timeout,
/// retry backoff starting at 1 second and ramping to 10 seconds, and an
/// infinite retry budget for the recurring integrity-style tasks.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub max_tx_fragment_size: usize,
    pub max_rx_fragment_size: usize,
    pub response_timeout: Duration,
    pub task_retry_period: Duration,
    pub max_task_retry_period: Duration,
    pub task_start_timeout: Duration,
    pub retry_count: Retries,
    /// IIN bits the master demands clear-restart-and-integrity for, beyond
    /// `DEVICE_RESTART`. The original stack exposes this as a
    /// single flag for `EVENT_BUFFER_OVERFLOW`; kept as a raw mask here so
    /// additional bits can be added without another config field.
    pub integrity_on_event_overflow_iin: u16,
    pub event_scan_on_events_available_mask: ClassMask,
    pub ignore_restart_iin: bool,
    pub control_qualifier_mode: ControlQualifierMode,
}

impl MasterConfig {
    pub fn with_max_tx_fragment_size(mut self, size: usize) -> Self {
        self.max_tx_fragment_size = size;
        self
    }

    pub fn with_max_rx_fragment_size(mut self, size: usize) -> Self {
        self.max_rx_fragment_size = size;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_retry_count(mut self, retries: Retries) -> Self {
        self.retry_count = retries;
        self
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            max_tx_fragment_size: 2048,
            max_rx_fragment_size: 2048,
            response_timeout: Duration::from_secs(5),
            task_retry_period: Duration::from_secs(1),
            max_task_retry_period: Duration::from_secs(10),
            task_start_timeout: Duration::from_secs(5),
            retry_count: Retries::Infinite,
            integrity_on_event_overflow_iin: Iin::EVENT_BUFFER_OVERFLOW,
            event_scan_on_events_available_mask: ClassMask::EVENTS,
            ignore_restart_iin: false,
            control_qualifier_mode: ControlQualifierMode::SameAsRequest,
        }
    }
}

/// Event buffer sizing per class. The SOE buffer itself lives in the
/// host application, but the outstation needs to know its capacity to
/// decide when `EVENT_BUFFER_OVERFLOW` applies and unsolicited class
/// thresholds are crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBufferConfig {
    pub max_class1: u16,
    pub max_class2: u16,
    pub max_class3: u16,
}

impl Default for EventBufferConfig {
    fn default() -> Self {
        Self {
            max_class1: 100,
            max_class2: 100,
            max_class3: 100,
        }
    }
}

/// Outstation stack configuration.
#[derive(Debug, Clone)]
pub struct OutstationConfig {
    pub max_tx_fragment_size: usize,
    pub max_rx_fragment_size: usize,
    pub select_timeout: Duration,
    pub max_controls_per_request: usize,
    pub unsolicited: bool,
    pub class_mask: ClassMask,
    pub respond_to_any_master: bool,
    pub event_buffer_config: EventBufferConfig,
    pub file_config: FileWorkerConfig,
}

impl OutstationConfig {
    pub fn with_select_timeout(mut self, timeout: Duration) -> Self {
        self.select_timeout = timeout;
        self
    }

    pub fn with_unsolicited(mut self, enabled: bool) -> Self {
        self.unsolicited = enabled;
        self
    }
}

impl Default for OutstationConfig {
    fn default() -> Self {
        Self {
            max_tx_fragment_size: 2048,
            max_rx_fragment_size: 2048,
            select_timeout: Duration::from_secs(10),
            max_controls_per_request: 64,
            unsolicited: false,
            class_mask: ClassMask::EVENTS,
            respond_to_any_master: false,
            event_buffer_config: EventBufferConfig::default(),
            file_config: FileWorkerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_config_defaults_match_documented_values() {
        let config = MasterConfig::default();
        assert_eq!(config.response_timeout, Duration::from_secs(5));
        assert_eq!(config.task_retry_period, Duration::from_secs(1));
        assert_eq!(config.max_task_retry_period, Duration::from_secs(10));
        assert_eq!(config.retry_count, Retries::Infinite);
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = MasterConfig::default()
            .with_response_timeout(Duration::from_secs(2))
            .with_max_tx_fragment_size(512);
        assert_eq!(config.response_timeout, Duration::from_secs(2));
        assert_eq!(config.max_tx_fragment_size, 512);
    }

    #[test]
    fn outstation_config_defaults_are_conservative() {
        let config = OutstationConfig::default();
        assert!(!config.unsolicited);
        assert!(!config.respond_to_any_master);
    }
}

//! Statistics registry: one monotone `u64` counter per [`StatisticsKind`],
//! with an optional subscription fired exactly once per mutation. The
//! callback carries the three-argument `(is_backup_channel, kind, delta)`
//! form and fires once, not twice, per `add`.

use std::collections::HashMap;
use std::sync::Mutex;

use dnp3_dtyp::StatisticsKind;

/// Subscriber to counter changes: `(is_backup_channel, kind, delta)`.
pub type ChangeHandler = Box<dyn Fn(bool, StatisticsKind, u64) + Send + Sync>;

/// Per-channel statistics counters. Counters reset when the owning
/// channel is torn down (a fresh registry is built, rather than a `reset`
/// method, since `StatisticsKind::ALL` enumerates every counter).
pub struct StatisticsRegistry {
    counters: Mutex<HashMap<StatisticsKind, u64>>,
    on_change: Option<ChangeHandler>,
    is_backup: bool,
}

impl StatisticsRegistry {
    pub fn new(is_backup: bool) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            on_change: None,
            is_backup,
        }
    }

    pub fn with_change_handler(mut self, handler: ChangeHandler) -> Self {
        self.on_change = Some(handler);
        self
    }

    /// Marks whether this registry belongs to the backup channel; flipped
    /// by the channel manager on failover so subsequent callbacks carry
    /// the correct `is_backup_channel` tag.
    pub fn set_is_backup(&mut self, is_backup: bool) {
        self.is_backup = is_backup;
    }

    /// Adds `delta` to `kind`'s counter and fires the change handler
    /// exactly once, if one is registered.
    pub fn add(&self, kind: StatisticsKind, delta: u64) {
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(kind).or_insert(0);
        *entry = entry.saturating_add(delta);
        drop(counters);
        if let Some(handler) = &self.on_change {
            handler(self.is_backup, kind, delta);
        }
    }

    pub fn increment(&self, kind: StatisticsKind) {
        self.add(kind, 1);
    }

    pub fn get(&self, kind: StatisticsKind) -> u64 {
        *self.counters.lock().unwrap().get(&kind).unwrap_or(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn fires_change_handler_exactly_once_per_add() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let registry = StatisticsRegistry::new(false)
            .with_change_handler(Box::new(move |is_backup, kind, delta| {
                assert!(!is_backup);
                assert_eq!(kind, StatisticsKind::BytesSent);
                assert_eq!(delta, 7);
                calls2.fetch_add(1, Ordering::SeqCst);
            }));

        registry.add(StatisticsKind::BytesSent, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get(StatisticsKind::BytesSent), 7);
    }

    #[test]
    fn counters_are_monotone() {
        let registry = StatisticsRegistry::new(false);
        registry.increment(StatisticsKind::FramesSent);
        registry.increment(StatisticsKind::FramesSent);
        assert_eq!(registry.get(StatisticsKind::FramesSent), 2);
    }
}

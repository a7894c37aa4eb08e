//! Unsolicited-response scheduling: a NULL unsolicited
//! response once at startup, then class-1/2/3 unsolicited responses
//! whenever the corresponding event count exceeds its configured
//! threshold. A pure decision core, the same shape as
//! [`crate::channel::ChannelManager`]'s failover logic: it owns no I/O,
//! only the counters and the enabled/disabled switch.

use dnp3_objects::ClassMask;

use crate::config::EventBufferConfig;

/// What the engine should send next, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsolicitedOutcome {
    None,
    /// The one-time NULL unsolicited response sent at startup.
    Null,
    /// An unsolicited response carrying these classes' event data.
    Data(ClassMask),
}

pub struct UnsolicitedScheduler {
    enabled: bool,
    allowed: ClassMask,
    sent_startup_null: bool,
    thresholds: EventBufferConfig,
    class1_count: u16,
    class2_count: u16,
    class3_count: u16,
}

impl UnsolicitedScheduler {
    pub fn new(enabled: bool, allowed: ClassMask, thresholds: EventBufferConfig) -> Self {
        Self {
            enabled,
            allowed,
            sent_startup_null: false,
            thresholds,
            class1_count: 0,
            class2_count: 0,
            class3_count: 0,
        }
    }

    /// Handles an `ENABLE_UNSOLICITED`/`DISABLE_UNSOLICITED` request
    ///: `classes` names the Group 60 headers the master supplied.
    /// Disabling clears the startup-NULL latch so re-enabling sends
    /// another one, matching the original stack's behavior.
    pub fn set_enabled(&mut self, enabled: bool, classes: ClassMask) {
        self.enabled = enabled;
        if enabled {
            self.allowed = classes;
        } else {
            self.sent_startup_null = false;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records one new event in `class` (1, 2, or 3); ignored otherwise.
    pub fn record_event(&mut self, class: u8) {
        match class {
            1 => self.class1_count = self.class1_count.saturating_add(1),
            2 => self.class2_count = self.class2_count.saturating_add(1),
            3 => self.class3_count = self.class3_count.saturating_add(1),
            _ => {}
        }
    }

    /// Called whenever the strand is free to emit unsolicited traffic.
    pub fn poll(&mut self) -> UnsolicitedOutcome {
        if !self.enabled {
            return UnsolicitedOutcome::None;
        }
        if !self.sent_startup_null {
            self.sent_startup_null = true;
            return UnsolicitedOutcome::Null;
        }

        let over = ClassMask {
            class0: false,
            class1: self.allowed.class1 && self.class1_count >= self.thresholds.max_class1,
            class2: self.allowed.class2 && self.class2_count >= self.thresholds.max_class2,
            class3: self.allowed.class3 && self.class3_count >= self.thresholds.max_class3,
        };
        if !over.any_events() {
            return UnsolicitedOutcome::None;
        }
        if over.class1 {
            self.class1_count = 0;
        }
        if over.class2 {
            self.class2_count = 0;
        }
        if over.class3 {
            self.class3_count = 0;
        }
        UnsolicitedOutcome::Data(over)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> EventBufferConfig {
        EventBufferConfig {
            max_class1: 3,
            max_class2: 3,
            max_class3: 3,
        }
    }

    #[test]
    fn disabled_scheduler_never_fires() {
        let mut s = UnsolicitedScheduler::new(false, ClassMask::EVENTS, thresholds());
        for _ in 0..10 {
            s.record_event(1);
        }
        assert_eq!(s.poll(), UnsolicitedOutcome::None);
    }

    #[test]
    fn sends_startup_null_exactly_once() {
        let mut s = UnsolicitedScheduler::new(true, ClassMask::EVENTS, thresholds());
        assert_eq!(s.poll(), UnsolicitedOutcome::Null);
        assert_eq!(s.poll(), UnsolicitedOutcome::None);
    }

    #[test]
    fn crossing_a_threshold_triggers_that_classs_data() {
        let mut s = UnsolicitedScheduler::new(true, ClassMask::EVENTS, thresholds());
        s.poll(); // drain the startup NULL
        s.record_event(2);
        s.record_event(2);
        assert_eq!(s.poll(), UnsolicitedOutcome::None);
        s.record_event(2);
        assert_eq!(
            s.poll(),
            UnsolicitedOutcome::Data(ClassMask {
                class0: false,
                class1: false,
                class2: true,
                class3: false,
            })
        );
        // the counter reset; it takes another 3 events to fire again.
        assert_eq!(s.poll(), UnsolicitedOutcome::None);
    }

    #[test]
    fn re_enabling_sends_another_startup_null() {
        let mut s = UnsolicitedScheduler::new(true, ClassMask::EVENTS, thresholds());
        assert_eq!(s.poll(), UnsolicitedOutcome::Null);
        s.set_enabled(false, ClassMask::NONE);
        s.set_enabled(true, ClassMask::EVENTS);
        assert_eq!(s.poll(), UnsolicitedOutcome::Null);
    }

    #[test]
    fn class_mask_restricts_which_thresholds_can_fire() {
        let mut s = UnsolicitedScheduler::new(
            true,
            ClassMask {
                class0: false,
                class1: false,
                class2: true,
                class3: false,
            },
            thresholds(),
        );
        s.poll(); // startup NULL
        for _ in 0..5 {
            s.record_event(1);
        }
        assert_eq!(s.poll(), UnsolicitedOutcome::None);
    }
}

//! Master Task Scheduler: the ordered selection of the "best" ready
//! task, expiration/priority/blocking discipline, and exponential retry
//! backoff.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::master::task::{Task, TaskCompletion};

/// Retry budget for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retries {
    Fixed(u32),
    Infinite,
}

impl Retries {
    fn has_budget(self) -> bool {
        match self {
            Retries::Fixed(n) => n > 0,
            Retries::Infinite => true,
        }
    }

    fn consume(self) -> Self {
        match self {
            Retries::Fixed(n) => Retries::Fixed(n.saturating_sub(1)),
            Retries::Infinite => Retries::Infinite,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryState {
    current_delay: Duration,
    min_delay: Duration,
    max_delay: Duration,
    remaining: Retries,
}

impl RetryState {
    fn new(min_delay: Duration, max_delay: Duration, remaining: Retries) -> Self {
        Self {
            current_delay: min_delay,
            min_delay,
            max_delay,
            remaining,
        }
    }

    /// `delay <- min(delay*2, max_retry_delay)`.
    fn backoff(&mut self) -> Duration {
        let delay = self.current_delay;
        self.current_delay = (self.current_delay * 2).min(self.max_delay);
        delay
    }

    fn reset(&mut self) {
        self.current_delay = self.min_delay;
    }
}

/// Opaque handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// A task record: `{ task, runner, is_recurring, expiration_time,
/// start_expiration, priority, blocked, retry_state }`.
/// `expiration_time = None` encodes "disabled" (+∞).
struct TaskRecord {
    task: Box<dyn Task>,
    is_recurring: bool,
    expiration_time: Option<Instant>,
    start_expiration: Option<Instant>,
    blocked: bool,
    started: bool,
    period: Option<Duration>,
    retry: RetryState,
}

/// What the scheduler wants the caller to do next.
pub enum SchedulerDecision {
    /// Run this task's `build_request` now.
    Run(TaskId),
    /// Nothing is ready; arm a timer for this instant and call
    /// [`MasterScheduler::tick`] again when it fires.
    WaitUntil(Instant),
    /// No tasks at all.
    Idle,
}

/// The master task scheduler.
pub struct MasterScheduler {
    tasks: HashMap<u64, TaskRecord>,
    next_id: u64,
    /// Priority of a currently-active task that declared
    /// `blocks_lower_priority`, if any.
    blocking_priority: Option<i16>,
}

impl MasterScheduler {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            next_id: 0,
            blocking_priority: None,
        }
    }

    /// Adds a task to the ready set.
    ///
    /// `expiration` is when the task becomes eligible to run (for a
    /// recurring task this is typically `now`, re-armed to `now + period`
    /// on success); `start_expiration` is the deadline a non-recurring task
    /// must have started by.
    pub fn add_task(
        &mut self,
        task: Box<dyn Task>,
        is_recurring: bool,
        expiration: Instant,
        start_expiration: Option<Instant>,
        period: Option<Duration>,
        retry_min: Duration,
        retry_max: Duration,
        retries: Retries,
    ) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert(
            id,
            TaskRecord {
                task,
                is_recurring,
                expiration_time: Some(expiration),
                start_expiration,
                blocked: false,
                started: false,
                period,
                retry: RetryState::new(retry_min, retry_max, retries),
            },
        );
        TaskId(id)
    }

    pub fn set_blocked(&mut self, id: TaskId, blocked: bool) {
        if let Some(record) = self.tasks.get_mut(&id.0) {
            record.blocked = blocked;
        }
    }

    pub fn cancel(&mut self, id: TaskId) -> Option<Box<dyn Task>> {
        self.tasks.remove(&id.0).map(|r| r.task)
    }

    fn effective_expiration(record: &TaskRecord, now: Instant) -> Option<Instant> {
        record.expiration_time.map(|e| e.max(now))
    }

    /// Applies the four-key comparison to pick the best ready task, or
    /// reports when the next one becomes eligible.
    pub fn pick(&mut self, now: Instant) -> SchedulerDecision {
        // Start-timeout sweep happens first so an expired,
        // never-started task is failed out rather than selected.
        let timed_out: Vec<u64> = self
            .tasks
            .iter()
            .filter(|(_, r)| {
                !r.started
                    && r.start_expiration
                        .map(|deadline| now >= deadline)
                        .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in timed_out {
            self.complete(TaskId(id), TaskCompletion::FailureStartTimeout, now);
        }

        let mut best: Option<(u64, Instant, i16)> = None;
        let mut earliest_wait: Option<Instant> = None;

        for (&id, record) in self.tasks.iter() {
            let Some(expiration) = record.expiration_time else {
                continue; // rule 1: disabled
            };
            if record.blocked {
                continue; // rule 2: blocked loses to any unblocked task
            }
            let priority = record.task.priority();
            if let Some(blocking) = self.blocking_priority {
                if priority > blocking {
                    continue;
                }
            }
            let effective = expiration.max(now);
            earliest_wait = Some(earliest_wait.map_or(effective, |w: Instant| w.min(effective)));

            let better = match &best {
                None => true,
                Some((_, best_expiration, best_priority)) => {
                    effective < *best_expiration
                        || (effective == *best_expiration && priority < *best_priority)
                }
            };
            if better {
                best = Some((id, effective, priority));
            }
        }

        match best {
            Some((id, effective, _)) if effective <= now => SchedulerDecision::Run(TaskId(id)),
            Some((_, effective, _)) => SchedulerDecision::WaitUntil(effective),
            None => match earliest_wait {
                Some(w) => SchedulerDecision::WaitUntil(w),
                None => SchedulerDecision::Idle,
            },
        }
    }

    /// Marks a task as started (runner is about to call `build_request`),
    /// and arms `blocking_priority` if it declares `blocks_lower_priority`.
    pub fn begin(&mut self, id: TaskId) -> Option<&mut Box<dyn Task>> {
        let record = self.tasks.get_mut(&id.0)?;
        if !record.started {
            record.started = true;
            record.task.on_start();
        }
        if record.task.blocks_lower_priority() {
            self.blocking_priority = Some(record.task.priority());
        }
        Some(&mut record.task)
    }

    /// Reports the outcome of running `id`'s request/response exchange,
    /// applying retry backoff or recurring re-queue as appropriate.
    pub fn complete(&mut self, id: TaskId, completion: TaskCompletion, now: Instant) {
        let Some(record) = self.tasks.get_mut(&id.0) else {
            return;
        };

        if record.task.blocks_lower_priority()
            && self.blocking_priority == Some(record.task.priority())
        {
            self.blocking_priority = None;
        }

        match completion {
            TaskCompletion::Success => {
                record.retry.reset();
                if record.is_recurring {
                    let period = record.period.unwrap_or(Duration::ZERO);
                    record.expiration_time = Some(now + period);
                    record.started = false;
                } else {
                    self.tasks.remove(&id.0);
                }
            }
            failure if failure.is_retry_eligible() && record.retry.remaining.has_budget() => {
                record.retry.remaining = record.retry.remaining.consume();
                let delay = record.retry.backoff();
                log::debug!("task {:?} failed ({completion:?}), retrying in {delay:?}", record.task.task_type());
                record.expiration_time = Some(now + delay);
                record.started = false;
            }
            _ => {
                log::warn!("task {:?} failed ({completion:?}), retry budget exhausted", record.task.task_type());
                self.tasks.remove(&id.0);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for MasterScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::header::FunctionCode;
    use crate::master::task::{TaskRequest, TaskStep, TaskType};
    use dnp3_objects::Iin;

    struct StubTask {
        name: &'static str,
        task_type: TaskType,
        recurring: bool,
        blocks: bool,
    }

    impl Task for StubTask {
        fn task_type(&self) -> TaskType {
            self.task_type
        }
        fn name(&self) -> &str {
            self.name
        }
        fn is_recurring(&self) -> bool {
            self.recurring
        }
        fn blocks_lower_priority(&self) -> bool {
            self.blocks
        }
        fn build_request(&mut self) -> TaskRequest {
            TaskRequest {
                function: FunctionCode::Read,
                objects: vec![],
                confirm: false,
            }
        }
        fn process_response(&mut self, _iin: Iin, _objects: &[u8]) -> TaskStep {
            TaskStep::Done(TaskCompletion::Success)
        }
    }

    fn stub(name: &'static str, task_type: TaskType) -> Box<dyn Task> {
        Box::new(StubTask {
            name,
            task_type,
            recurring: false,
            blocks: false,
        })
    }

    #[test]
    fn priority_breaks_ties_at_equal_expiration() {
        let mut scheduler = MasterScheduler::new();
        let now = Instant::now();
        let low = scheduler.add_task(
            stub("user_poll", TaskType::UserPoll),
            false,
            now,
            None,
            None,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Fixed(0),
        );
        let high = scheduler.add_task(
            stub("integrity", TaskType::IntegrityPoll),
            false,
            now,
            None,
            None,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Fixed(0),
        );
        match scheduler.pick(now) {
            SchedulerDecision::Run(id) => assert_eq!(id, high),
            _ => panic!("expected a runnable task"),
        }
        let _ = low;
    }

    #[test]
    fn earlier_expiration_wins_even_over_higher_priority() {
        let mut scheduler = MasterScheduler::new();
        let now = Instant::now();
        let earlier = scheduler.add_task(
            stub("user_poll", TaskType::UserPoll),
            false,
            now,
            None,
            None,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Fixed(0),
        );
        scheduler.add_task(
            stub("integrity", TaskType::IntegrityPoll),
            false,
            now + Duration::from_secs(5),
            None,
            None,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Fixed(0),
        );
        match scheduler.pick(now) {
            SchedulerDecision::Run(id) => assert_eq!(id, earlier),
            _ => panic!("expected the earlier-expiring task to win"),
        }
    }

    #[test]
    fn blocked_task_loses_to_unblocked() {
        let mut scheduler = MasterScheduler::new();
        let now = Instant::now();
        let blocked = scheduler.add_task(
            stub("integrity", TaskType::IntegrityPoll),
            false,
            now,
            None,
            None,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Fixed(0),
        );
        let runnable = scheduler.add_task(
            stub("user_poll", TaskType::UserPoll),
            false,
            now,
            None,
            None,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Fixed(0),
        );
        scheduler.set_blocked(blocked, true);
        match scheduler.pick(now) {
            SchedulerDecision::Run(id) => assert_eq!(id, runnable),
            _ => panic!("expected the unblocked task to win"),
        }
    }

    #[test]
    fn start_timeout_fails_a_never_started_task() {
        let mut scheduler = MasterScheduler::new();
        let now = Instant::now();
        let id = scheduler.add_task(
            stub("user_poll", TaskType::UserPoll),
            false,
            now,
            Some(now - Duration::from_secs(1)),
            None,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Fixed(0),
        );
        scheduler.pick(now);
        assert!(scheduler.tasks.get(&id.0).is_none());
    }

    #[test]
    fn retry_backoff_doubles_up_to_max() {
        let mut scheduler = MasterScheduler::new();
        let now = Instant::now();
        let id = scheduler.add_task(
            stub("user_poll", TaskType::UserPoll),
            false,
            now,
            None,
            None,
            Duration::from_secs(1),
            Duration::from_secs(4),
            Retries::Fixed(3),
        );
        scheduler.complete(id, TaskCompletion::FailureResponseTimeout, now);
        let first = scheduler.tasks.get(&id.0).unwrap().expiration_time.unwrap();
        assert_eq!(first, now + Duration::from_secs(1));
        scheduler.complete(id, TaskCompletion::FailureResponseTimeout, now);
        let second = scheduler.tasks.get(&id.0).unwrap().expiration_time.unwrap();
        assert_eq!(second, now + Duration::from_secs(2));
    }

    #[test]
    fn recurring_task_is_requeued_with_period_on_success() {
        let mut scheduler = MasterScheduler::new();
        let now = Instant::now();
        let id = scheduler.add_task(
            stub("integrity", TaskType::IntegrityPoll),
            true,
            now,
            None,
            Some(Duration::from_secs(30)),
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Infinite,
        );
        scheduler.complete(id, TaskCompletion::Success, now);
        assert_eq!(scheduler.len(), 1);
        let expiration = scheduler.tasks.get(&id.0).unwrap().expiration_time.unwrap();
        assert_eq!(expiration, now + Duration::from_secs(30));
    }

    #[test]
    fn blocking_task_excludes_lower_priority_candidates() {
        let mut scheduler = MasterScheduler::new();
        let now = Instant::now();
        let blocker = scheduler.add_task(
            Box::new(StubTask {
                name: "command",
                task_type: TaskType::Command,
                recurring: false,
                blocks: true,
            }),
            false,
            now,
            None,
            None,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Fixed(0),
        );
        scheduler.add_task(
            stub("user_poll", TaskType::UserPoll),
            false,
            now,
            None,
            None,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Retries::Fixed(0),
        );
        scheduler.begin(blocker);
        match scheduler.pick(now) {
            SchedulerDecision::Idle => {}
            SchedulerDecision::WaitUntil(_) => {}
            SchedulerDecision::Run(id) => assert_eq!(id, blocker),
        }
    }
}

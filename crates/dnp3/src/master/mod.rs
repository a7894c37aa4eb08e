//! Master stack: wires the [`scheduler`]'s task selection to
//! the application layer's fragment encode/decode, driving one active
//! task's request/response rounds to completion.

pub mod scheduler;
pub mod task;
pub mod tasks;

use std::time::Instant;

use dnp3_objects::Iin;

use crate::app::header::{RequestFragment, ResponseFragment};
use crate::app::master::{IinAction, MasterApplication, MasterOutcome, PendingConfirm};
use scheduler::{MasterScheduler, SchedulerDecision, TaskId};
use task::{Task, TaskCompletion, TaskStep};

/// What the caller (the channel's strand) should do next.
pub enum MasterAction {
    /// Send this fragment and wait for the matching response.
    Send(RequestFragment),
    /// Nothing ready to run; re-poll no later than this instant.
    WaitUntil(Instant),
    /// No tasks at all.
    Idle,
}

/// Drives the Master Task Scheduler and the master application layer
/// together: at most one task is ever "active" (its request outstanding)
/// at a time.
pub struct MasterSession {
    scheduler: MasterScheduler,
    app: MasterApplication,
    active: Option<TaskId>,
}

impl MasterSession {
    pub fn new(max_tx_fragment_size: usize) -> Self {
        Self {
            scheduler: MasterScheduler::new(),
            app: MasterApplication::new(max_tx_fragment_size),
            active: None,
        }
    }

    pub fn scheduler_mut(&mut self) -> &mut MasterScheduler {
        &mut self.scheduler
    }

    /// Maps response IIN bits to scheduler demands; the caller owns
    /// turning an [`IinAction`] into a concrete task + sink, the same
    /// external-collaborator pattern as [`tasks::ObjectSink`].
    pub fn iin_actions(&self, iin: Iin) -> Vec<IinAction> {
        self.app.iin_actions(iin)
    }

    /// If no task is currently active, asks the scheduler for the next one
    /// to run and builds its first request fragment.
    pub fn poll(&mut self, now: Instant) -> MasterAction {
        if self.active.is_some() {
            return MasterAction::Idle;
        }
        match self.scheduler.pick(now) {
            SchedulerDecision::Run(id) => {
                let Some(task) = self.scheduler.begin(id) else {
                    return MasterAction::Idle;
                };
                let request = task.build_request();
                match self.app.build_request(request.function, request.objects, request.confirm) {
                    Ok(fragment) => {
                        self.active = Some(id);
                        MasterAction::Send(fragment)
                    }
                    Err(_) => {
                        self.scheduler.complete(id, TaskCompletion::FailureBadRequest, now);
                        MasterAction::Idle
                    }
                }
            }
            SchedulerDecision::WaitUntil(when) => MasterAction::WaitUntil(when),
            SchedulerDecision::Idle => MasterAction::Idle,
        }
    }

    /// The active task timed out waiting for a response.
    pub fn on_timeout(&mut self, now: Instant) {
        let Some(id) = self.active.take() else { return };
        let Some(task) = self.scheduler.begin(id) else {
            return;
        };
        self.app.clear_outstanding();
        match task.on_timeout() {
            TaskStep::Done(completion) => self.scheduler.complete(id, completion, now),
            TaskStep::Continue(_) => {
                // A task that wants another round after a timeout is still
                // done as far as the scheduler's retry budget is concerned;
                // it will be re-run from `on_start` on its next expiration.
                self.scheduler.complete(id, TaskCompletion::FailureResponseTimeout, now);
            }
        }
    }

    /// Feeds one response fragment through the application layer and, for
    /// a solicited response belonging to the active task, through that
    /// task's state machine.
    pub fn on_fragment(&mut self, now: Instant, resp: &ResponseFragment) -> Option<MasterAction> {
        match self.app.on_response(resp) {
            MasterOutcome::Complete {
                iin,
                objects,
                needs_confirm,
                unsolicited,
            } => {
                if unsolicited {
                    return needs_confirm.map(|seq| {
                        MasterAction::Send(self.app.build_confirm(PendingConfirm::Unsolicited(seq)))
                    });
                }
                let id = self.active?;
                let task = self.scheduler.begin(id)?;
                let step = task.process_response(iin, &objects);
                match step {
                    TaskStep::Done(completion) => {
                        self.active = None;
                        self.scheduler.complete(id, completion, now);
                        needs_confirm.map(|seq| {
                            MasterAction::Send(self.app.build_confirm(PendingConfirm::Solicited(seq)))
                        })
                    }
                    TaskStep::Continue(next) => {
                        match self.app.build_request(next.function, next.objects, next.confirm) {
                            Ok(fragment) => Some(MasterAction::Send(fragment)),
                            Err(_) => {
                                self.active = None;
                                self.scheduler.complete(id, TaskCompletion::FailureBadRequest, now);
                                None
                            }
                        }
                    }
                }
            }
            MasterOutcome::Partial => None,
            MasterOutcome::Dropped(_) => None,
        }
    }
}

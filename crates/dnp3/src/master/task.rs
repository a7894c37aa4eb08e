//! The `Task` contract: concrete task state machines are driven through
//! one trait object per task, selected and run by the scheduler.

use dnp3_objects::Iin;

use crate::app::header::FunctionCode;

/// Which family a task belongs to, used to assign its default scheduling
/// priority (`integrity_poll < clear_restart < time_sync < event_scan
/// < auto_event_scan < command < file_op < user_poll`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    IntegrityPoll,
    ClearRestart,
    TimeSync,
    EventScan,
    AutoEventScan,
    Command,
    FileOp,
    UserPoll,
}

impl TaskType {
    /// The numeric priority conventionally assigned to this family; lower
    /// wins ties in the scheduler's fourth comparison key.
    pub fn default_priority(self) -> i16 {
        use TaskType::*;
        match self {
            IntegrityPoll => 0,
            ClearRestart => 1,
            TimeSync => 2,
            EventScan => 3,
            AutoEventScan => 4,
            Command => 5,
            FileOp => 6,
            UserPoll => 7,
        }
    }
}

/// Task completion taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCompletion {
    Success,
    FailureResponseTimeout,
    FailureBadResponse,
    FailureNoComms,
    FailureCanceled,
    FailureStartTimeout,
    FailureBadRequest,
}

impl TaskCompletion {
    /// Whether this failure consumes retry budget rather than
    /// completing the task immediately.
    pub fn is_retry_eligible(self) -> bool {
        matches!(
            self,
            TaskCompletion::FailureResponseTimeout | TaskCompletion::FailureBadResponse
        )
    }
}

/// One request/response round the task wants to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub function: FunctionCode,
    pub objects: Vec<u8>,
    pub confirm: bool,
}

/// What the task wants the scheduler/runner to do after processing one
/// response (or a timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStep {
    /// Send another request and keep the task active.
    Continue(TaskRequest),
    /// The task is finished.
    Done(TaskCompletion),
}

/// A master task state machine: `build_request`/`process_response`/
/// `on_timeout` drive one task through its request/response rounds;
/// `on_start`, `name`, `priority`, `is_recurring`, `blocks_lower_priority`,
/// and `task_type` describe it to the scheduler.
pub trait Task: Send {
    fn task_type(&self) -> TaskType;

    fn name(&self) -> &str;

    fn priority(&self) -> i16 {
        self.task_type().default_priority()
    }

    fn is_recurring(&self) -> bool;

    fn blocks_lower_priority(&self) -> bool {
        false
    }

    /// Called once when the scheduler activates the task.
    fn on_start(&mut self) {}

    /// Builds the first (or only) request of the task.
    fn build_request(&mut self) -> TaskRequest;

    /// Processes a response; `iin` is always supplied, `objects` is the
    /// decoded-but-not-yet-typed object section of the response.
    fn process_response(&mut self, iin: Iin, objects: &[u8]) -> TaskStep;

    /// Called when the outstanding request for this task's last `build_request`/
    /// `Continue` times out without a response.
    fn on_timeout(&mut self) -> TaskStep {
        TaskStep::Done(TaskCompletion::FailureResponseTimeout)
    }
}

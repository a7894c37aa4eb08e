//! Direct-Operate / Select-Operate command task: builds the
//! `[DIRECT_OPERATE]` or `[SELECT, OPERATE]` step sequence; overall result
//! is `SUCCESS` only if every echoed object reports `CommandStatus::Success`.

use dnp3_objects::{CommandStatus, Iin, ObjectHeader, Qualifier};

use crate::app::header::FunctionCode;
use crate::master::task::{Task, TaskCompletion, TaskRequest, TaskStep, TaskType};

/// Which command primitive the task executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    DirectOperate,
    SelectBeforeOperate,
}

/// Parses the per-object `CommandStatus` echoed back after a header,
/// where each command object is `object_size` bytes with its status in
/// the last byte (true of both `Crob` and `AnalogOutputCommand32`).
fn parse_command_statuses(objects: &[u8], object_size: usize) -> Option<Vec<CommandStatus>> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < objects.len() {
        let (header, consumed) = ObjectHeader::read(&objects[offset..]).ok()?;
        offset += consumed;
        let (count, index_width) = match header.qualifier {
            Qualifier::IndexPrefix8(c) => (c as usize, 1),
            Qualifier::IndexPrefix16(c) => (c as usize, 2),
            Qualifier::Range8(r) => (r.count() as usize, 0),
            Qualifier::Range16(r) => (r.count() as usize, 0),
            _ => return None,
        };
        for _ in 0..count {
            offset += index_width;
            if offset + object_size > objects.len() {
                return None;
            }
            out.push(CommandStatus::try_from_u8(objects[offset + object_size - 1]));
            offset += object_size;
        }
    }
    Some(out)
}

/// A DIRECT_OPERATE or SELECT/OPERATE command sequence.
pub struct CommandTask {
    mode: CommandMode,
    object_size: usize,
    objects: Vec<u8>,
    step: usize,
}

impl CommandTask {
    /// `objects` is the pre-encoded header(s) + command object(s) to send
    /// on each step; `object_size` is the fixed width of one command
    /// object (11 for `Crob`, 5 for `AnalogOutputCommand32`).
    pub fn new(mode: CommandMode, objects: Vec<u8>, object_size: usize) -> Self {
        Self {
            mode,
            object_size,
            objects,
            step: 0,
        }
    }

    fn steps(&self) -> &'static [FunctionCode] {
        match self.mode {
            CommandMode::DirectOperate => &[FunctionCode::DirectOperate],
            CommandMode::SelectBeforeOperate => &[FunctionCode::Select, FunctionCode::Operate],
        }
    }
}

impl Task for CommandTask {
    fn task_type(&self) -> TaskType {
        TaskType::Command
    }

    fn name(&self) -> &str {
        "command"
    }

    fn is_recurring(&self) -> bool {
        false
    }

    fn build_request(&mut self) -> TaskRequest {
        TaskRequest {
            function: self.steps()[self.step],
            objects: self.objects.clone(),
            confirm: false,
        }
    }

    fn process_response(&mut self, _iin: Iin, objects: &[u8]) -> TaskStep {
        let Some(statuses) = parse_command_statuses(objects, self.object_size) else {
            return TaskStep::Done(TaskCompletion::FailureBadResponse);
        };
        if statuses.is_empty() || !statuses.iter().all(|s| *s == CommandStatus::Success) {
            return TaskStep::Done(TaskCompletion::FailureBadResponse);
        }

        self.step += 1;
        if self.step < self.steps().len() {
            TaskStep::Continue(TaskRequest {
                function: self.steps()[self.step],
                objects: self.objects.clone(),
                confirm: false,
            })
        } else {
            TaskStep::Done(TaskCompletion::Success)
        }
    }
}

//! Clear-restart: a single `WRITE` of Group 80 Var 1 (Internal Indications)
//! clearing the `DEVICE_RESTART` bit. Non-recurring, high priority (runs
//! right after integrity polls, ahead of time sync).

use dnp3_objects::{Iin, ObjectHeader};

use crate::app::header::FunctionCode;
use crate::master::task::{Task, TaskCompletion, TaskRequest, TaskStep, TaskType};

/// Bit index of `DEVICE_RESTART` within the Group 80 Var 1 bitmap object.
const DEVICE_RESTART_INDEX: u8 = 7;

pub struct ClearRestartTask;

impl ClearRestartTask {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClearRestartTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for ClearRestartTask {
    fn task_type(&self) -> TaskType {
        TaskType::ClearRestart
    }

    fn name(&self) -> &str {
        "clear_restart"
    }

    fn is_recurring(&self) -> bool {
        false
    }

    fn build_request(&mut self) -> TaskRequest {
        let mut objects = Vec::new();
        ObjectHeader::range8(80, 1, DEVICE_RESTART_INDEX, DEVICE_RESTART_INDEX).write(&mut objects);
        objects.push(0); // clear the bit
        TaskRequest {
            function: FunctionCode::Write,
            objects,
            confirm: false,
        }
    }

    fn process_response(&mut self, _iin: Iin, _objects: &[u8]) -> TaskStep {
        TaskStep::Done(TaskCompletion::Success)
    }
}

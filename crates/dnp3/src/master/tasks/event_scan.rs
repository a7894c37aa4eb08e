//! Event scan: `READ class1/2/3`, and the auto-event-scan variant
//! demanded by an `IIN.CLASSn_EVENTS` bit.

use dnp3_objects::{ClassMask, Iin, ObjectHeader};

use crate::app::header::FunctionCode;
use crate::master::task::{Task, TaskCompletion, TaskRequest, TaskStep, TaskType};
use crate::master::tasks::ObjectSink;

fn encode_event_classes(mask: ClassMask) -> Vec<u8> {
    let mut objects = Vec::new();
    let event_mask = ClassMask {
        class0: false,
        ..mask
    };
    for variation in event_mask.group60_variations() {
        ObjectHeader::all_objects(60, variation).write(&mut objects);
    }
    objects
}

/// A user- or scheduler-triggered `READ` of the configured event classes.
pub struct EventScanTask {
    class_mask: ClassMask,
    sink: ObjectSink,
    task_type: TaskType,
}

impl EventScanTask {
    pub fn new(class_mask: ClassMask, sink: ObjectSink) -> Self {
        Self {
            class_mask,
            sink,
            task_type: TaskType::EventScan,
        }
    }
}

impl Task for EventScanTask {
    fn task_type(&self) -> TaskType {
        self.task_type
    }

    fn name(&self) -> &str {
        "event_scan"
    }

    fn is_recurring(&self) -> bool {
        false
    }

    fn build_request(&mut self) -> TaskRequest {
        TaskRequest {
            function: FunctionCode::Read,
            objects: encode_event_classes(self.class_mask),
            confirm: false,
        }
    }

    fn process_response(&mut self, _iin: Iin, objects: &[u8]) -> TaskStep {
        (self.sink)(objects);
        TaskStep::Done(TaskCompletion::Success)
    }
}

/// Same request/response handling as [`EventScanTask`], but scheduled with
/// [`TaskType::AutoEventScan`]'s lower priority since it was demanded by an
/// `IIN.CLASSn_EVENTS` bit rather than by the user.
pub struct AutoEventScanTask(EventScanTask);

impl AutoEventScanTask {
    pub fn new(class_mask: ClassMask, sink: ObjectSink) -> Self {
        let mut inner = EventScanTask::new(class_mask, sink);
        inner.task_type = TaskType::AutoEventScan;
        Self(inner)
    }
}

impl Task for AutoEventScanTask {
    fn task_type(&self) -> TaskType {
        self.0.task_type()
    }

    fn name(&self) -> &str {
        "auto_event_scan"
    }

    fn is_recurring(&self) -> bool {
        false
    }

    fn build_request(&mut self) -> TaskRequest {
        self.0.build_request()
    }

    fn process_response(&mut self, iin: Iin, objects: &[u8]) -> TaskStep {
        self.0.process_response(iin, objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_scan_excludes_class0() {
        let mut task = EventScanTask::new(ClassMask::ALL, Box::new(|_| {}));
        let req = task.build_request();
        assert_eq!(req.objects.len(), 3 * 3);
        assert!(!req.objects.chunks(3).any(|h| h[1] == 1)); // no class0 (group60 var1)
    }

    #[test]
    fn auto_event_scan_has_lower_priority_than_user_scan() {
        let manual = EventScanTask::new(ClassMask::EVENTS, Box::new(|_| {}));
        let auto = AutoEventScanTask::new(ClassMask::EVENTS, Box::new(|_| {}));
        assert!(auto.priority() > manual.priority());
    }
}

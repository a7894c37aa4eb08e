//! Integrity poll: `READ class0123`.

use dnp3_objects::{ClassMask, Iin, ObjectHeader};

use crate::app::header::FunctionCode;
use crate::master::task::{Task, TaskCompletion, TaskRequest, TaskStep, TaskType};
use crate::master::tasks::ObjectSink;

/// Recurring `READ class0123` integrity scan.
pub struct IntegrityPollTask {
    class_mask: ClassMask,
    sink: ObjectSink,
    recurring: bool,
}

impl IntegrityPollTask {
    pub fn new(class_mask: ClassMask, sink: ObjectSink) -> Self {
        Self {
            class_mask,
            sink,
            recurring: true,
        }
    }

    fn encode_request(&self) -> Vec<u8> {
        let mut objects = Vec::new();
        for variation in self.class_mask.group60_variations() {
            ObjectHeader::all_objects(60, variation).write(&mut objects);
        }
        objects
    }
}

impl Task for IntegrityPollTask {
    fn task_type(&self) -> TaskType {
        TaskType::IntegrityPoll
    }

    fn name(&self) -> &str {
        "integrity_poll"
    }

    fn is_recurring(&self) -> bool {
        self.recurring
    }

    fn build_request(&mut self) -> TaskRequest {
        TaskRequest {
            function: FunctionCode::Read,
            objects: self.encode_request(),
            confirm: false,
        }
    }

    fn process_response(&mut self, _iin: Iin, objects: &[u8]) -> TaskStep {
        (self.sink)(objects);
        TaskStep::Done(TaskCompletion::Success)
    }
}

/// A one-shot integrity scan run once at stack startup, sharing the
/// same request/response handling as the recurring [`IntegrityPollTask`].
pub struct StartupIntegrityPoll(IntegrityPollTask);

impl StartupIntegrityPoll {
    pub fn new(class_mask: ClassMask, sink: ObjectSink) -> Self {
        let mut inner = IntegrityPollTask::new(class_mask, sink);
        inner.recurring = false;
        Self(inner)
    }
}

impl Task for StartupIntegrityPoll {
    fn task_type(&self) -> TaskType {
        self.0.task_type()
    }

    fn name(&self) -> &str {
        "startup_integrity_poll"
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
    use std::sync::{Arc, Mutex};

    #[test]
    fn requests_all_four_classes() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        let mut task = IntegrityPollTask::new(
            ClassMask::ALL,
            Box::new(move |objects| received2.lock().unwrap().extend_from_slice(objects)),
        );
        let req = task.build_request();
        // Four class headers, 3 bytes each (group, variation, qualifier 0x06).
        assert_eq!(req.objects.len(), 4 * 3);
        assert_eq!(&req.objects[0..3], &[60, 1, 0x06]);

        let step = task.process_response(Iin::empty(), &[0x81, 0x01, 0x81]);
        assert_eq!(step, TaskStep::Done(TaskCompletion::Success));
        assert_eq!(*received.lock().unwrap(), vec![0x81, 0x01, 0x81]);
    }
}

//! File read task: `{OPENING, READING, CLOSING}` state machine.
//! Opens a remote file for read, streams Group 70 Var 5 blocks to a sink
//! until the last-block bit is set, then closes the handle.

use dnp3_file::{FileCommand, FileCommandStatusObject, FileOpeningMode, FileTransport};
use dnp3_objects::Iin;

use crate::app::header::FunctionCode;
use crate::master::task::{Task, TaskCompletion, TaskRequest, TaskStep, TaskType};
use crate::master::tasks::file_common::{map_command_status, unwrap_free_format, wrap_free_format};
use crate::master::tasks::ObjectSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Opening,
    Reading,
    Closing,
}

pub struct FileReadTask {
    name: String,
    block_size: u16,
    sink: ObjectSink,
    state: State,
    file_handle: u32,
}

impl FileReadTask {
    pub fn new(name: impl Into<String>, block_size: u16, sink: ObjectSink) -> Self {
        Self {
            name: name.into(),
            block_size,
            sink,
            state: State::Opening,
            file_handle: 0,
        }
    }

    fn open_request(&self) -> Vec<u8> {
        let command = FileCommand {
            ctime: dnp3_dtyp::Timestamp::now(),
            permissions: dnp3_dtyp::Permissions::from_unix_mode(0o644),
            auth_key: 0,
            file_size: 0,
            mode: FileOpeningMode::Read,
            block_size: self.block_size,
            request_id: 0,
            name: self.name.clone(),
        };
        wrap_free_format(3, &command.encode())
    }

    fn close_request(&self) -> Vec<u8> {
        let command = FileCommand {
            ctime: dnp3_dtyp::Timestamp::now(),
            permissions: dnp3_dtyp::Permissions::from_unix_mode(0o644),
            auth_key: 0,
            file_size: 0,
            mode: FileOpeningMode::Delete, // close uses the same var3 object; mode is ignored by an open handle close
            block_size: self.block_size,
            request_id: self.file_handle as u16,
            name: String::new(),
        };
        wrap_free_format(3, &command.encode())
    }
}

impl Task for FileReadTask {
    fn task_type(&self) -> TaskType {
        TaskType::FileOp
    }

    fn name(&self) -> &str {
        "file_read"
    }

    fn is_recurring(&self) -> bool {
        false
    }

    fn on_start(&mut self) {
        self.state = State::Opening;
        self.file_handle = 0;
    }

    fn build_request(&mut self) -> TaskRequest {
        TaskRequest {
            function: FunctionCode::OpenFile,
            objects: self.open_request(),
            confirm: false,
        }
    }

    fn process_response(&mut self, _iin: Iin, objects: &[u8]) -> TaskStep {
        match self.state {
            State::Opening => {
                let Some(body) = unwrap_free_format(4, objects) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                let Ok(status) = FileCommandStatusObject::decode(body) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                if let Some(failure) = map_command_status(status.status) {
                    return TaskStep::Done(failure.into());
                }
                self.file_handle = status.file_handle;
                self.state = State::Reading;
                TaskStep::Continue(TaskRequest {
                    function: FunctionCode::Read,
                    objects: Vec::new(),
                    confirm: false,
                })
            }
            State::Reading => {
                let Some(body) = unwrap_free_format(5, objects) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                let Ok(block) = FileTransport::decode(body) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                (self.sink)(&block.data);
                if block.is_last_block {
                    self.state = State::Closing;
                    TaskStep::Continue(TaskRequest {
                        function: FunctionCode::CloseFile,
                        objects: self.close_request(),
                        confirm: false,
                    })
                } else {
                    TaskStep::Continue(TaskRequest {
                        function: FunctionCode::Read,
                        objects: Vec::new(),
                        confirm: false,
                    })
                }
            }
            State::Closing => {
                let Some(body) = unwrap_free_format(4, objects) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                let Ok(status) = FileCommandStatusObject::decode(body) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                match map_command_status(status.status) {
                    Some(failure) => TaskStep::Done(failure.into()),
                    None => TaskStep::Done(TaskCompletion::Success),
                }
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn status_response(variation: u8, status: dnp3_file::FileCommandStatus, handle: u32) -> Vec<u8> {
        let obj = FileCommandStatusObject {
            file_handle: handle,
            file_size: 0,
            block_size: 1024,
            request_id: 0,
            status,
        };
        wrap_free_format(variation, &obj.encode())
    }

    fn block_response(handle: u32, block_number: u32, last: bool, data: &[u8]) -> Vec<u8> {
        let block = FileTransport {
            file_handle: handle,
            block_number,
            is_last_block: last,
            data: data.to_vec(),
        };
        wrap_free_format(5, &block.encode())
    }

    #[test]
    fn reads_single_block_file_to_completion() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        let mut task = FileReadTask::new(
            "/a.bin",
            1024,
            Box::new(move |data| received2.lock().unwrap().extend_from_slice(data)),
        );

        let open_req = task.build_request();
        assert_eq!(open_req.function, FunctionCode::OpenFile);

        let opened = status_response(4, dnp3_file::FileCommandStatus::Success, 7);
        match task.process_response(Iin::empty(), &opened) {
            TaskStep::Continue(req) => assert_eq!(req.function, FunctionCode::Read),
            other => panic!("expected Continue, got {other:?}"),
        }

        let block = block_response(7, 0, true, b"hello");
        match task.process_response(Iin::empty(), &block) {
            TaskStep::Continue(req) => assert_eq!(req.function, FunctionCode::CloseFile),
            other => panic!("expected Continue, got {other:?}"),
        }
        assert_eq!(*received.lock().unwrap(), b"hello");

        let closed = status_response(4, dnp3_file::FileCommandStatus::Success, 7);
        assert_eq!(
            task.process_response(Iin::empty(), &closed),
            TaskStep::Done(TaskCompletion::Success)
        );
    }

    #[test]
    fn open_permission_denied_aborts_task() {
        let mut task = FileReadTask::new("/secret", 1024, Box::new(|_| {}));
        task.build_request();
        let denied = status_response(4, dnp3_file::FileCommandStatus::PermissionDenied, 0);
        assert_eq!(
            task.process_response(Iin::empty(), &denied),
            TaskStep::Done(TaskCompletion::FailureBadResponse)
        );
    }
}

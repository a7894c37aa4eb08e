//! File write task: `{OPENING, WRITING, CLOSING}`
//! state machine. A `HANDLE_TIMEOUT` status during `WRITING` sends the task
//! back to `OPENING`; the write resumes from block 0 once the handle is
//! re-established.

use dnp3_file::{FileCommand, FileCommandStatusObject, FileOpeningMode, FileTransport, FileTransportStatusObject};
use dnp3_objects::Iin;

use crate::app::header::FunctionCode;
use crate::master::task::{Task, TaskCompletion, TaskRequest, TaskStep, TaskType};
use crate::master::tasks::file_common::{map_command_status, map_transport_status, unwrap_free_format, wrap_free_format};

/// Supplies the bytes to write, block by block. `reset` rewinds to the
/// start, used when a `HANDLE_TIMEOUT` forces the task back to `OPENING`.
pub trait FileWriteSource: Send {
    /// Returns up to `max_len` bytes and whether this is the final block.
    fn next_block(&mut self, max_len: usize) -> (Vec<u8>, bool);
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Opening,
    Writing,
    Closing,
}

pub struct FileWriteTask {
    name: String,
    file_size: u32,
    block_size: u16,
    source: Box<dyn FileWriteSource>,
    state: State,
    file_handle: u32,
    block_number: u32,
    last_block_sent: bool,
}

impl FileWriteTask {
    pub fn new(
        name: impl Into<String>,
        file_size: u32,
        block_size: u16,
        source: Box<dyn FileWriteSource>,
    ) -> Self {
        Self {
            name: name.into(),
            file_size,
            block_size,
            source,
            state: State::Opening,
            file_handle: 0,
            block_number: 0,
            last_block_sent: false,
        }
    }

    fn open_request(&self) -> Vec<u8> {
        let command = FileCommand {
            ctime: dnp3_dtyp::Timestamp::now(),
            permissions: dnp3_dtyp::Permissions::from_unix_mode(0o644),
            auth_key: 0,
            file_size: self.file_size,
            mode: FileOpeningMode::Write,
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
            file_size: self.file_size,
            mode: FileOpeningMode::Write,
            block_size: self.block_size,
            request_id: self.file_handle as u16,
            name: String::new(),
        };
        wrap_free_format(3, &command.encode())
    }

    fn next_write_request(&mut self) -> TaskRequest {
        let (data, is_last) = self.source.next_block(self.block_size as usize);
        self.last_block_sent = is_last;
        let block = FileTransport {
            file_handle: self.file_handle,
            block_number: self.block_number,
            is_last_block: is_last,
            data,
        };
        TaskRequest {
            function: FunctionCode::Write,
            objects: wrap_free_format(5, &block.encode()),
            confirm: false,
        }
    }
}

impl Task for FileWriteTask {
    fn task_type(&self) -> TaskType {
        TaskType::FileOp
    }

    fn name(&self) -> &str {
        "file_write"
    }

    fn is_recurring(&self) -> bool {
        false
    }

    fn on_start(&mut self) {
        self.state = State::Opening;
        self.file_handle = 0;
        self.block_number = 0;
        self.last_block_sent = false;
        self.source.reset();
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
                self.block_number = 0;
                self.state = State::Writing;
                TaskStep::Continue(self.next_write_request())
            }
            State::Writing => {
                let Some(body) = unwrap_free_format(6, objects) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                let Ok(status) = FileTransportStatusObject::decode(body) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                match status.status {
                    dnp3_file::FileTransportStatus::HandleTimeout => {
                        self.source.reset();
                        self.block_number = 0;
                        self.last_block_sent = false;
                        self.state = State::Opening;
                        TaskStep::Continue(TaskRequest {
                            function: FunctionCode::OpenFile,
                            objects: self.open_request(),
                            confirm: false,
                        })
                    }
                    dnp3_file::FileTransportStatus::Success => {
                        let was_last = self.last_block_sent;
                        self.block_number += 1;
                        if was_last {
                            self.state = State::Closing;
                            TaskStep::Continue(TaskRequest {
                                function: FunctionCode::CloseFile,
                                objects: self.close_request(),
                                confirm: false,
                            })
                        } else {
                            TaskStep::Continue(self.next_write_request())
                        }
                    }
                    other => match map_transport_status(other) {
                        Some(failure) => TaskStep::Done(failure.into()),
                        None => TaskStep::Continue(self.next_write_request()),
                    },
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

    struct FixedSource {
        remaining: Vec<u8>,
        offset: usize,
    }

    impl FixedSource {
        fn new(data: &[u8]) -> Self {
            Self {
                remaining: data.to_vec(),
                offset: 0,
            }
        }
    }

    impl FileWriteSource for FixedSource {
        fn next_block(&mut self, max_len: usize) -> (Vec<u8>, bool) {
            let end = (self.offset + max_len).min(self.remaining.len());
            let chunk = self.remaining[self.offset..end].to_vec();
            self.offset = end;
            (chunk, self.offset >= self.remaining.len())
        }

        fn reset(&mut self) {
            self.offset = 0;
        }
    }

    fn open_status(status: dnp3_file::FileCommandStatus, handle: u32) -> Vec<u8> {
        let obj = FileCommandStatusObject {
            file_handle: handle,
            file_size: 0,
            block_size: 1024,
            request_id: 0,
            status,
        };
        wrap_free_format(4, &obj.encode())
    }

    fn transport_status(block_number: u32, status: dnp3_file::FileTransportStatus) -> Vec<u8> {
        let obj = FileTransportStatusObject {
            file_handle: 7,
            block_number,
            status,
            info: Vec::new(),
        };
        wrap_free_format(6, &obj.encode())
    }

    #[test]
    fn handle_timeout_reopens_and_resumes_from_block_zero() {
        let source = Box::new(FixedSource::new(&[0u8; 1024]));
        let mut task = FileWriteTask::new("/a.bin", 3000, 1024, source);

        let open_req = task.build_request();
        assert_eq!(open_req.function, FunctionCode::OpenFile);

        let opened = open_status(dnp3_file::FileCommandStatus::Success, 7);
        let write0 = match task.process_response(Iin::empty(), &opened) {
            TaskStep::Continue(req) => req,
            other => panic!("expected Continue, got {other:?}"),
        };
        assert_eq!(write0.function, FunctionCode::Write);

        let timeout = transport_status(0, dnp3_file::FileTransportStatus::HandleTimeout);
        let reopen = match task.process_response(Iin::empty(), &timeout) {
            TaskStep::Continue(req) => req,
            other => panic!("expected Continue, got {other:?}"),
        };
        assert_eq!(reopen.function, FunctionCode::OpenFile);

        let opened_again = open_status(dnp3_file::FileCommandStatus::Success, 7);
        let write_again = match task.process_response(Iin::empty(), &opened_again) {
            TaskStep::Continue(req) => req,
            other => panic!("expected Continue, got {other:?}"),
        };
        assert_eq!(write_again.function, FunctionCode::Write);

        let success = transport_status(0, dnp3_file::FileTransportStatus::Success);
        let close_req = match task.process_response(Iin::empty(), &success) {
            TaskStep::Continue(req) => req,
            other => panic!("expected Continue, got {other:?}"),
        };
        assert_eq!(close_req.function, FunctionCode::CloseFile);

        let closed = open_status(dnp3_file::FileCommandStatus::Success, 7);
        assert_eq!(
            task.process_response(Iin::empty(), &closed),
            TaskStep::Done(TaskCompletion::Success)
        );
    }
}
